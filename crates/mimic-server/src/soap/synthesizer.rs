//! Response synthesis for the SOAP protocol.
//!
//! Converts the resolution pipeline's abstract response template plus the
//! imposter's service contract into protocol-correct transport bytes. One
//! synthesizer is constructed per imposter and shared by reference into the
//! request path.

use std::collections::HashMap;

use crate::imposter::types::{HttpEnvelope, RequestError, ResponseDescriptor, ResponseTemplate};
use crate::soap::wsdl::{BodyRequest, Wsdl};
use crate::soap::SoapRequest;

/// Namespace prefix bound to the invoked operation's URI in synthesized
/// envelopes.
const NAMESPACE_PREFIX: &str = "mb";

/// Status for the one-way message exchange pattern: accepted, no content
/// expected.
const ONE_WAY_STATUS: u16 = 202;

pub struct SoapSynthesizer {
    wsdl: Wsdl,
}

impl SoapSynthesizer {
    pub fn new(wsdl: Wsdl) -> Self {
        Self { wsdl }
    }

    /// Produce the final transport envelope for a resolved stub template.
    ///
    /// With no service contract the default one-way envelope goes out
    /// unchanged apart from the forced connection header. With a contract,
    /// the schema-defined body is rendered for the invoked operation and
    /// wrapped in the mandatory envelope/header/body structure.
    pub fn synthesize(
        &self,
        resolved: &ResponseTemplate,
        request: &SoapRequest,
    ) -> Result<ResponseDescriptor, RequestError> {
        let mut headers = resolved.headers.clone();
        force_connection_close(&mut headers);

        let mut http = HttpEnvelope {
            status_code: ONE_WAY_STATUS,
            headers,
            body: String::new(),
        };

        if !self.wsdl.is_empty() {
            let fragment = self.wsdl.create_body_for(BodyRequest {
                response: &resolved.response,
                request,
                namespace_prefix: NAMESPACE_PREFIX,
            })?;
            // create_body_for validated the operation, so it is present here.
            let operation = request.operation.as_ref().ok_or_else(|| {
                RequestError::SynthesisFailure("request does not name an operation".to_string())
            })?;

            http.status_code = 200;
            http.body = format!(
                "<soapenv:Envelope xmlns:{NAMESPACE_PREFIX}=\"{}\" xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\">\n   <soapenv:Header/>\n   <soapenv:Body>{}</soapenv:Body>\n</soapenv:Envelope>",
                operation.uri, fragment
            );
        }

        Ok(ResponseDescriptor {
            http,
            response: resolved.response.clone(),
        })
    }
}

/// Every synthesized response terminates its connection after the reply is
/// sent; stub configuration cannot override this.
fn force_connection_close(headers: &mut HashMap<String, String>) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case("connection"));
    headers.insert("connection".to_string(), "close".to_string());
}
