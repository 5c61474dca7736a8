//! Parsed service contract (WSDL) for schema-driven response synthesis.
//!
//! Parsing goes no further than the synthesis contract requires: the
//! document must be well-formed XML and declare the operations the
//! imposter is allowed to answer. Everything else in the WSDL is ignored.

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

use crate::imposter::types::{ImposterError, RequestError};
use crate::soap::SoapRequest;

/// Machine-readable service contract associated with an imposter.
#[derive(Debug, Clone, Default)]
pub struct Wsdl {
    /// Operation names declared by the contract, in document order.
    operations: Vec<String>,
}

/// Inputs for rendering one schema-defined body fragment.
pub struct BodyRequest<'a> {
    /// Configured response payload from the matched stub; ground-truth data
    /// for the rendered fragment.
    pub response: &'a serde_json::Value,
    pub request: &'a SoapRequest,
    pub namespace_prefix: &'a str,
}

impl Wsdl {
    /// Parse an optional WSDL source.
    ///
    /// Absent or blank input produces an empty contract; schema-driven
    /// synthesis is disabled for it. A non-blank document that does not
    /// parse fails imposter creation, not request handling.
    pub fn parse(source: Option<&str>) -> Result<Self, ImposterError> {
        let Some(text) = source else {
            return Ok(Self::default());
        };
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let package =
            parser::parse(text).map_err(|e| ImposterError::InvalidWsdl(e.to_string()))?;
        let document = package.as_document();

        let mut operations = Vec::new();
        for child in document.root().children() {
            if let ChildOfRoot::Element(e) = child {
                collect_operations(e, &mut operations);
            }
        }

        Ok(Self { operations })
    }

    /// True when no contract was supplied; the synthesizer must then return
    /// the bare transport envelope untouched.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Render the inner schema-defined body fragment for the invoked
    /// operation. Produces only the fragment; the caller wraps it in the
    /// protocol envelope.
    pub fn create_body_for(&self, body_request: BodyRequest<'_>) -> Result<String, RequestError> {
        let operation = body_request.request.operation.as_ref().ok_or_else(|| {
            RequestError::SynthesisFailure("request does not name an operation".to_string())
        })?;

        if !self.operations.iter().any(|op| op == &operation.name) {
            return Err(RequestError::SynthesisFailure(format!(
                "operation '{}' is not defined by the service contract",
                operation.name
            )));
        }

        let prefix = body_request.namespace_prefix;
        let mut fragment = String::new();
        fragment.push_str(&format!("<{prefix}:{}Response>", operation.name));
        render_value(body_request.response, prefix, &mut fragment);
        fragment.push_str(&format!("</{prefix}:{}Response>", operation.name));
        Ok(fragment)
    }
}

fn collect_operations(element: Element<'_>, operations: &mut Vec<String>) {
    if element.name().local_part() == "operation" {
        if let Some(name) = element.attribute_value("name") {
            if !operations.iter().any(|op| op == name) {
                operations.push(name.to_string());
            }
        }
    }
    for child in element.children() {
        if let ChildOfElement::Element(e) = child {
            collect_operations(e, operations);
        }
    }
}

/// Marshal a JSON payload into prefixed XML elements. Objects nest, arrays
/// repeat their parent element, scalars become escaped text.
fn render_value(value: &serde_json::Value, prefix: &str, out: &mut String) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                render_field(key, child, prefix, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                render_value(item, prefix, out);
            }
        }
        scalar => out.push_str(&escape_text(&scalar_text(scalar))),
    }
}

fn render_field(key: &str, value: &serde_json::Value, prefix: &str, out: &mut String) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                render_field(key, item, prefix, out);
            }
        }
        _ => {
            out.push_str(&format!("<{prefix}:{key}>"));
            render_value(value, prefix, out);
            out.push_str(&format!("</{prefix}:{key}>"));
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const STOCK_WSDL: &str = r#"<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" targetNamespace="http://example.com/stock">
  <wsdl:portType name="StockQuotePortType">
    <wsdl:operation name="GetQuote"/>
    <wsdl:operation name="ListSymbols"/>
  </wsdl:portType>
</wsdl:definitions>"#;

    fn request_for(operation: &str) -> SoapRequest {
        let body = format!(
            r#"<e:Envelope xmlns:e="http://schemas.xmlsoap.org/soap/envelope/"><e:Body><op:{operation} xmlns:op="http://example.com/stock"/></e:Body></e:Envelope>"#
        );
        SoapRequest::from_parts(
            "127.0.0.1:50000".to_string(),
            "/stock".to_string(),
            HashMap::new(),
            body,
        )
        .unwrap()
    }

    #[test]
    fn absent_and_blank_sources_are_empty() {
        assert!(Wsdl::parse(None).unwrap().is_empty());
        assert!(Wsdl::parse(Some("   ")).unwrap().is_empty());
    }

    #[test]
    fn invalid_wsdl_fails_parse() {
        assert!(matches!(
            Wsdl::parse(Some("<unclosed")),
            Err(ImposterError::InvalidWsdl(_))
        ));
    }

    #[test]
    fn renders_fragment_for_known_operation() {
        let wsdl = Wsdl::parse(Some(STOCK_WSDL)).unwrap();
        let request = request_for("GetQuote");
        let payload = serde_json::json!({"price": "12.50", "symbol": "ACME"});

        let fragment = wsdl
            .create_body_for(BodyRequest {
                response: &payload,
                request: &request,
                namespace_prefix: "mb",
            })
            .unwrap();

        assert!(fragment.starts_with("<mb:GetQuoteResponse>"));
        assert!(fragment.ends_with("</mb:GetQuoteResponse>"));
        assert!(fragment.contains("<mb:price>12.50</mb:price>"));
        assert!(fragment.contains("<mb:symbol>ACME</mb:symbol>"));
    }

    #[test]
    fn unknown_operation_is_a_synthesis_failure() {
        let wsdl = Wsdl::parse(Some(STOCK_WSDL)).unwrap();
        let request = request_for("Nonexistent");

        let result = wsdl.create_body_for(BodyRequest {
            response: &serde_json::Value::Null,
            request: &request,
            namespace_prefix: "mb",
        });
        assert!(matches!(result, Err(RequestError::SynthesisFailure(_))));
    }

    #[test]
    fn escapes_scalar_text() {
        let wsdl = Wsdl::parse(Some(STOCK_WSDL)).unwrap();
        let request = request_for("GetQuote");
        let payload = serde_json::json!({"note": "a < b & c"});

        let fragment = wsdl
            .create_body_for(BodyRequest {
                response: &payload,
                request: &request,
                namespace_prefix: "mb",
            })
            .unwrap();
        assert!(fragment.contains("<mb:note>a &lt; b &amp; c</mb:note>"));
    }
}
