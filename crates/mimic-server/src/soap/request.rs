//! Canonical request normalization for the SOAP protocol.
//!
//! Converts raw inbound HTTP traffic into the transport-agnostic
//! [`SoapRequest`] the resolution pipeline consumes. The operation is the
//! first element child of the SOAP Body; its local name and namespace URI
//! identify which schema operation the client invoked.

use std::collections::HashMap;

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

use crate::imposter::types::RequestError;

/// The invoked SOAP operation: local name plus namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub uri: String,
}

/// Protocol-neutral view of one inbound message.
///
/// Immutable once constructed. `request_from` identifies the originating
/// connection for logging and correlation only; it never participates in
/// stub matching.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub request_from: String,
    pub operation: Option<Operation>,
    pub path: String,
    /// Header keys are lowercased on ingest; HTTP header names are
    /// case-insensitive.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl SoapRequest {
    /// Normalize raw request parts into a canonical request.
    ///
    /// An empty body yields `operation: None` (heartbeat and assertion-only
    /// imposters accept arbitrary probes). A non-empty body must be a
    /// parseable XML document containing a SOAP Body element.
    pub fn from_parts(
        request_from: String,
        path: String,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<Self, RequestError> {
        let operation = parse_operation(&body)?;
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        Ok(Self {
            request_from,
            operation,
            path,
            headers,
            body,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Extract the invoked operation from a SOAP envelope, if any.
fn parse_operation(body: &str) -> Result<Option<Operation>, RequestError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let package = parser::parse(body)
        .map_err(|e| RequestError::MalformedRequest(format!("invalid XML payload: {e}")))?;
    let document = package.as_document();

    let envelope = document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(e) => Some(e),
            _ => None,
        })
        .ok_or_else(|| {
            RequestError::MalformedRequest("payload has no document element".to_string())
        })?;

    let soap_body = child_element_named(envelope, "Body").ok_or_else(|| {
        RequestError::MalformedRequest("payload has no SOAP Body element".to_string())
    })?;

    // An empty Body is a legal one-way probe.
    let operation = first_child_element(soap_body).map(|element| Operation {
        name: element.name().local_part().to_string(),
        uri: element.name().namespace_uri().unwrap_or("").to_string(),
    });

    Ok(operation)
}

fn child_element_named<'d>(parent: Element<'d>, local_name: &str) -> Option<Element<'d>> {
    parent.children().into_iter().find_map(|child| match child {
        ChildOfElement::Element(e) if e.name().local_part() == local_name => Some(e),
        _ => None,
    })
}

fn first_child_element(parent: Element<'_>) -> Option<Element<'_>> {
    parent.children().into_iter().find_map(|child| match child {
        ChildOfElement::Element(e) => Some(e),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tns="http://example.com/stock">
  <soapenv:Header/>
  <soapenv:Body>
    <tns:GetQuote><tns:symbol>ACME</tns:symbol></tns:GetQuote>
  </soapenv:Body>
</soapenv:Envelope>"#;

    #[test]
    fn parses_operation_from_envelope() {
        let request = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/stock".to_string(),
            HashMap::new(),
            ENVELOPE.to_string(),
        )
        .unwrap();

        let operation = request.operation.expect("operation");
        assert_eq!(operation.name, "GetQuote");
        assert_eq!(operation.uri, "http://example.com/stock");
    }

    #[test]
    fn empty_body_has_no_operation() {
        let request = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/".to_string(),
            HashMap::new(),
            String::new(),
        )
        .unwrap();
        assert!(request.operation.is_none());
    }

    #[test]
    fn garbage_body_is_malformed() {
        let result = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/".to_string(),
            HashMap::new(),
            "this is not xml".to_string(),
        );
        assert!(matches!(result, Err(RequestError::MalformedRequest(_))));
    }

    #[test]
    fn xml_without_soap_body_is_malformed() {
        let result = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/".to_string(),
            HashMap::new(),
            "<root><child/></root>".to_string(),
        );
        assert!(matches!(result, Err(RequestError::MalformedRequest(_))));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/xml".to_string());
        let request = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/".to_string(),
            headers,
            String::new(),
        )
        .unwrap();

        assert_eq!(request.header("content-type"), Some("text/xml"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/xml"));
    }

    #[test]
    fn envelope_with_empty_body_has_no_operation() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body/></soapenv:Envelope>"#;
        let request = SoapRequest::from_parts(
            "127.0.0.1:51234".to_string(),
            "/".to_string(),
            HashMap::new(),
            xml.to_string(),
        )
        .unwrap();
        assert!(request.operation.is_none());
    }
}
