//! Resolution pipeline: turns a canonical request into an abstract response
//! template.
//!
//! The server core consumes resolution only through the narrow
//! [`ResponseResolver`] contract. [`StubSet`] is the default
//! implementation: ordered first-match stub selection with round-robin
//! rotation across a stub's responses, plus optional rhai injection.
//! Predicates stay opaque JSON; only shallow `equals` forms are evaluated
//! here.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::types::{RequestError, ResponseTemplate, Stub, StubResponse};
use crate::soap::SoapRequest;

/// Consumed contract: given a canonical request, produce the abstract
/// response template the synthesizer will marshal into protocol bytes.
#[async_trait]
pub trait ResponseResolver: Send + Sync {
    async fn resolve(&self, request: &SoapRequest) -> Result<ResponseTemplate, RequestError>;
}

struct StubEntry {
    stub: Stub,
    /// Cursor into the stub's response list; responses rotate round-robin.
    cursor: AtomicUsize,
}

/// Ordered, mutable stub store shared across concurrent requests.
pub struct StubSet {
    entries: RwLock<Vec<StubEntry>>,
    allow_injection: bool,
}

impl StubSet {
    pub fn new(stubs: Vec<Stub>, allow_injection: bool) -> Self {
        let entries = stubs
            .into_iter()
            .map(|stub| StubEntry {
                stub,
                cursor: AtomicUsize::new(0),
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
            allow_injection,
        }
    }

    /// Append a stub; callable concurrently with live traffic.
    pub fn add_stub(&self, stub: Stub) {
        let mut entries = self.entries.write();
        entries.push(StubEntry {
            stub,
            cursor: AtomicUsize::new(0),
        });
    }

    /// Snapshot of the configured stubs, in match order.
    pub fn stubs(&self) -> Vec<Stub> {
        self.entries.read().iter().map(|e| e.stub.clone()).collect()
    }

    /// Select the next response of the first stub whose predicates all hold.
    ///
    /// Returns `None` when no stub matches (or the matching stub has no
    /// responses); resolution then falls back to the empty default template.
    fn select_response(&self, request: &SoapRequest) -> Result<Option<StubResponse>, RequestError> {
        let entries = self.entries.read();
        for entry in entries.iter() {
            if !stub_matches(&entry.stub.predicates, request)? {
                continue;
            }
            let responses = &entry.stub.responses;
            if responses.is_empty() {
                return Ok(None);
            }
            let index = entry.cursor.fetch_add(1, Ordering::Relaxed) % responses.len();
            return Ok(Some(responses[index].clone()));
        }
        Ok(None)
    }

    /// Turn a selected response into a concrete template, running injected
    /// logic when the imposter permits it.
    fn materialize(
        &self,
        response: StubResponse,
        request: &SoapRequest,
    ) -> Result<ResponseTemplate, RequestError> {
        match response {
            StubResponse::Is { is } => Ok(is),
            StubResponse::Inject { inject } => {
                if !self.allow_injection {
                    return Err(RequestError::ResolutionFailure(
                        "stub injection is not allowed on this server".to_string(),
                    ));
                }
                execute_inject(&inject, request)
            }
        }
    }
}

#[async_trait]
impl ResponseResolver for StubSet {
    async fn resolve(&self, request: &SoapRequest) -> Result<ResponseTemplate, RequestError> {
        let Some(response) = self.select_response(request)? else {
            debug!("no stub matched, using default response template");
            return Ok(ResponseTemplate::default());
        };
        self.materialize(response, request)
    }
}

/// Evaluate a stub's predicate set against a canonical request. All
/// predicates must hold; an operator this core does not understand is a
/// resolution failure surfaced through the request's fault boundary.
pub fn stub_matches(
    predicates: &[serde_json::Value],
    request: &SoapRequest,
) -> Result<bool, RequestError> {
    for predicate in predicates {
        if !predicate_matches(predicate, request)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn predicate_matches(
    predicate: &serde_json::Value,
    request: &SoapRequest,
) -> Result<bool, RequestError> {
    let object = predicate.as_object().ok_or_else(|| {
        RequestError::ResolutionFailure("predicate must be a JSON object".to_string())
    })?;

    for (operator, fields) in object {
        match operator.as_str() {
            "equals" => {
                if !equals_matches(fields, request)? {
                    return Ok(false);
                }
            }
            other => {
                return Err(RequestError::ResolutionFailure(format!(
                    "unsupported predicate operator '{other}'"
                )));
            }
        }
    }
    Ok(true)
}

fn equals_matches(
    fields: &serde_json::Value,
    request: &SoapRequest,
) -> Result<bool, RequestError> {
    let fields = fields.as_object().ok_or_else(|| {
        RequestError::ResolutionFailure("'equals' predicate must be a JSON object".to_string())
    })?;

    for (field, expected) in fields {
        let matched = match field.as_str() {
            "path" => string_equals(expected, &request.path),
            "operation" | "method" => match &request.operation {
                Some(op) => string_equals(expected, &op.name),
                None => false,
            },
            "body" => string_equals(expected, &request.body),
            "headers" => {
                let Some(expected_headers) = expected.as_object() else {
                    return Err(RequestError::ResolutionFailure(
                        "'headers' predicate must be a JSON object".to_string(),
                    ));
                };
                expected_headers.iter().all(|(name, value)| {
                    request
                        .header(name)
                        .is_some_and(|actual| string_equals(value, actual))
                })
            }
            other => {
                return Err(RequestError::ResolutionFailure(format!(
                    "unsupported predicate field '{other}'"
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn string_equals(expected: &serde_json::Value, actual: &str) -> bool {
    match expected.as_str() {
        Some(s) => s.eq_ignore_ascii_case(actual),
        None => false,
    }
}

/// Run a stub's injected rhai script against the canonical request.
///
/// The script sees a `request` map (operation, path, headers, body) and
/// evaluates to a map with optional `headers` and `response` entries.
fn execute_inject(script: &str, request: &SoapRequest) -> Result<ResponseTemplate, RequestError> {
    let engine = rhai::Engine::new();
    let ast = engine
        .compile(script)
        .map_err(|e| RequestError::ResolutionFailure(format!("inject script error: {e}")))?;

    let request_json = serde_json::json!({
        "operation": request.operation.as_ref().map(|op| op.name.clone()),
        "path": request.path,
        "headers": request.headers,
        "body": request.body,
    });
    let request_value = rhai::serde::to_dynamic(&request_json)
        .map_err(|e| RequestError::ResolutionFailure(format!("inject script error: {e}")))?;

    let mut scope = rhai::Scope::new();
    scope.push_dynamic("request", request_value);

    let result: rhai::Dynamic = engine
        .eval_ast_with_scope(&mut scope, &ast)
        .map_err(|e| RequestError::ResolutionFailure(format!("inject script error: {e}")))?;

    let value: serde_json::Value = rhai::serde::from_dynamic(&result)
        .map_err(|e| RequestError::ResolutionFailure(format!("inject script error: {e}")))?;

    serde_json::from_value(value)
        .map_err(|e| RequestError::ResolutionFailure(format!("inject result error: {e}")))
}

/// Compile-check an injected script without executing it. Used by the
/// dry-run validator.
pub(crate) fn check_inject(script: &str) -> Result<(), RequestError> {
    let engine = rhai::Engine::new();
    engine
        .compile(script)
        .map(|_| ())
        .map_err(|e| RequestError::ResolutionFailure(format!("inject script error: {e}")))
}
