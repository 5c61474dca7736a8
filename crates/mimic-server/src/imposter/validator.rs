//! Dry-run validation of imposter configurations.
//!
//! Validation exercises the same normalizer, resolver, and synthesizer
//! code paths a live request would take, against one synthetic canonical
//! request, without binding any socket or accepting any traffic. Errors
//! surface synchronously so a bad configuration is rejected before an
//! imposter is committed.

use std::collections::HashMap;
use std::fmt;

use super::resolver::{check_inject, stub_matches};
use super::types::{ImposterConfig, StubResponse};
use crate::soap::{SoapRequest, SoapSynthesizer, Wsdl};

/// One configuration error found during a dry run.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub stub_index: usize,
    /// Response index within the stub, when the error is response-scoped.
    pub response_index: Option<usize>,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.response_index {
            Some(response_index) => write!(
                f,
                "invalid stub {} response {}: {}",
                self.stub_index, response_index, self.message
            ),
            None => write!(f, "invalid stub {}: {}", self.stub_index, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Socketless validator for stub configurations.
pub struct DryRunValidator {
    allow_injection: bool,
}

impl DryRunValidator {
    pub fn create(allow_injection: bool) -> Self {
        Self { allow_injection }
    }

    /// Validate a configuration; returns every error found.
    pub fn validate(&self, config: &ImposterConfig) -> Result<(), Vec<ValidationError>> {
        let test_request = test_request();
        // Schema lookups are a request-time concern; the dry run uses an
        // empty contract so a valid stub is not rejected for not matching
        // the synthetic request's (nonexistent) operation.
        let synthesizer = SoapSynthesizer::new(Wsdl::default());

        let mut errors = Vec::new();
        for (stub_index, stub) in config.stubs.iter().enumerate() {
            if let Err(e) = stub_matches(&stub.predicates, &test_request) {
                errors.push(ValidationError {
                    stub_index,
                    response_index: None,
                    message: e.to_string(),
                });
            }

            for (response_index, response) in stub.responses.iter().enumerate() {
                let result = match response {
                    StubResponse::Inject { inject } => {
                        if !self.allow_injection {
                            Err("inject is not allowed unless the server is started with injection enabled".to_string())
                        } else {
                            check_inject(inject).map_err(|e| e.to_string())
                        }
                    }
                    StubResponse::Is { is } => synthesizer
                        .synthesize(is, &test_request)
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                };

                if let Err(message) = result {
                    errors.push(ValidationError {
                        stub_index,
                        response_index: Some(response_index),
                        message,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The synthetic canonical request every dry run resolves against, built
/// through the same normalization path live traffic takes.
fn test_request() -> SoapRequest {
    SoapRequest::from_parts(
        String::new(),
        "/".to_string(),
        HashMap::new(),
        String::new(),
    )
    .expect("synthetic test request is always well-formed")
}

/// Flatten validation errors into one message for creation failures.
pub fn joined_message(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
