//! Type definitions for the imposter system.
//!
//! This module contains the structs, enums, and error types shared by the
//! stub resolver, the protocol server, and the management surface.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::soap::SoapRequest;

// ============================================================================
// Imposter Config
// ============================================================================

fn default_protocol() -> String {
    "soap".to_string()
}

/// Configuration for creating an imposter.
///
/// This is the JSON/YAML body a management layer submits to bring a new
/// virtual service up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImposterConfig {
    /// Port for the imposter. Absent or zero means an OS-assigned ephemeral
    /// port; the actual port is reported on the handle after binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Host/IP address to bind to. Defaults to "0.0.0.0" (all interfaces).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Optional display name, surfaced in metadata and the log scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub record_requests: bool,
    #[serde(default)]
    pub stubs: Vec<Stub>,
    /// Raw WSDL text. Absent or blank disables schema-driven synthesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wsdl: Option<String>,
}

impl Default for ImposterConfig {
    fn default() -> Self {
        Self {
            port: None,
            host: None,
            protocol: default_protocol(),
            name: None,
            record_requests: false,
            stubs: Vec::new(),
            wsdl: None,
        }
    }
}

// ============================================================================
// Stub Types
// ============================================================================

/// A configured request-matching rule plus the responses it should produce.
///
/// Predicates are opaque JSON owned by the resolution pipeline; this crate
/// only evaluates shallow `equals` forms and never defines the grammar.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Stub {
    #[serde(default)]
    pub predicates: Vec<serde_json::Value>,
    #[serde(default)]
    pub responses: Vec<StubResponse>,
}

/// One response within a stub: either a static template or injected logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StubResponse {
    Is { is: ResponseTemplate },
    Inject { inject: String },
}

/// The static response template configured on a stub, and equally the shape
/// the resolution pipeline hands to the synthesizer: transport headers plus
/// the protocol-semantic payload to marshal into the reply body.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTemplate {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub response: serde_json::Value,
}

// ============================================================================
// Response Descriptor
// ============================================================================

/// Transport envelope of a synthesized response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEnvelope {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Result of resolution plus synthesis: the transport envelope written to the
/// wire and the protocol-semantic payload it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    pub http: HttpEnvelope,
    pub response: serde_json::Value,
}

// ============================================================================
// Recorded Requests
// ============================================================================

/// A canonical request captured on an imposter running in record mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub request_from: String,
    /// Operation local name, when the request carried a SOAP Body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub path: String,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub timestamp: String,
}

impl RecordedRequest {
    pub fn from_request(request: &SoapRequest) -> Self {
        Self {
            request_from: request.request_from.clone(),
            operation: request.operation.as_ref().map(|op| op.name.clone()),
            path: request.path.clone(),
            headers: request.headers.clone(),
            body: if request.body.is_empty() {
                None
            } else {
                Some(request.body.clone())
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures scoped to a single request.
///
/// All three variants are recovered at the per-request fault boundary and
/// turned into an error reply on that request's connection; they never reach
/// the listener.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("resolution failed: {0}")]
    ResolutionFailure(String),
    #[error("synthesis failed: {0}")]
    SynthesisFailure(String),
}

impl RequestError {
    /// Stable machine-readable code for the error sink.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MalformedRequest(_) => "bad data",
            RequestError::ResolutionFailure(_) => "resolution error",
            RequestError::SynthesisFailure(_) => "synthesis error",
        }
    }

    /// Transport status for the error reply written back to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::MalformedRequest(_) => 400,
            _ => 500,
        }
    }

    /// Structured detail shape sent to the error sink and the client.
    pub fn details(&self) -> ErrorDetails {
        ErrorDetails {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serialized error detail: a kind/code plus a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Failures surfaced to the caller of imposter creation or management.
#[derive(Debug, thiserror::Error)]
pub enum ImposterError {
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Imposter not found on port {0}")]
    NotFound(u16),
    #[error("Failed to bind port {0}: {1}")]
    BindError(u16, String),
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),
    #[error("Invalid WSDL: {0}")]
    InvalidWsdl(String),
    #[error("Invalid stub configuration: {0}")]
    InvalidStubs(String),
}
