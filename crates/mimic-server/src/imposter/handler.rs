//! Per-connection and per-request handling for a running imposter.
//!
//! Every request runs inside its own fault boundary: any failure in the
//! normalize -> resolve -> synthesize chain is converted into a structured
//! error reply on that request's connection and never reaches the listener
//! or sibling requests.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use super::core::Imposter;
use super::resolver::ResponseResolver;
use super::types::{RecordedRequest, RequestError, ResponseDescriptor};
use crate::soap::{SoapRequest, SoapSynthesizer};

/// Per-imposter request-handling dependencies, constructed once at server
/// creation and shared by reference into every connection task.
pub(crate) struct ImposterContext {
    pub imposter: Arc<Imposter>,
    pub synthesizer: Arc<SoapSynthesizer>,
}

/// Serve one accepted connection until it closes.
///
/// The connection gets a stable `addr:port` identity for logging, and its
/// lifecycle (established / closed / transmission error) is observed here
/// without ever propagating an error to the accept loop.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: Arc<ImposterContext>,
) {
    let client = addr.to_string();
    debug!(client = %client, "connection established");

    let io = TokioIo::new(stream);
    let service_client = client.clone();
    let service = service_fn(move |req| {
        let context = Arc::clone(&context);
        let client = service_client.clone();
        async move { handle_request(req, context, client).await }
    });

    match http1::Builder::new().serve_connection(io, service).await {
        Ok(()) => debug!(client = %client, "connection closed"),
        Err(e) => error!(client = %client, error = %e, "connection transmission error"),
    }
}

/// The per-request fault boundary.
async fn handle_request(
    req: Request<Incoming>,
    context: Arc<ImposterContext>,
    client: String,
) -> Result<Response<Full<Bytes>>, Infallible> {
    context.imposter.increment_request_count();

    match process_request(req, &context, &client).await {
        Ok(descriptor) => Ok(descriptor_to_response(&descriptor)),
        Err(e) => {
            let details = e.details();
            error!(client = %client, code = %details.code, message = %details.message, "request failed");
            Ok(error_response(&e))
        }
    }
}

/// Normalize -> record -> resolve -> synthesize for one request.
async fn process_request(
    req: Request<Incoming>,
    context: &ImposterContext,
    client: &str,
) -> Result<ResponseDescriptor, RequestError> {
    let path = req.uri().path().to_string();
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let body_bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| RequestError::MalformedRequest(format!("failed to read request body: {e}")))?
        .to_bytes();
    let body = String::from_utf8_lossy(&body_bytes).to_string();

    let request = SoapRequest::from_parts(client.to_string(), path, headers, body)?;
    info!(
        client = %client,
        operation = request.operation.as_ref().map(|op| op.name.as_str()).unwrap_or("-"),
        path = %request.path,
        "request received"
    );

    // Recording happens before resolution so the recorded sequence reflects
    // arrival order at the normalization step, not resolution completion.
    context
        .imposter
        .record_request(RecordedRequest::from_request(&request));

    let resolved = context.imposter.stubs.resolve(&request).await?;
    let descriptor = context.synthesizer.synthesize(&resolved, &request)?;

    debug!(client = %client, status = descriptor.http.status_code, "response synthesized");
    Ok(descriptor)
}

fn descriptor_to_response(descriptor: &ResponseDescriptor) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(descriptor.http.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);
    for (key, value) in &descriptor.http.headers {
        match (
            hyper::header::HeaderName::from_bytes(key.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                builder = builder.header(name, value);
            }
            _ => warn!(header = %key, "dropping unrepresentable response header"),
        }
    }

    builder
        .body(Full::new(Bytes::from(descriptor.http.body.clone())))
        .unwrap_or_else(|_| fallback_response())
}

/// Best-effort protocol-valid error reply for a failed request.
fn error_response(error: &RequestError) -> Response<Full<Bytes>> {
    let details = error.details();
    let body = serde_json::to_string(&details)
        .unwrap_or_else(|_| r#"{"code":"error","message":"request failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .header("content-type", "application/json")
        .header("connection", "close")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| fallback_response())
}

fn fallback_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}
