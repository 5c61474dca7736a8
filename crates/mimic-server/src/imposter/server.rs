//! Protocol server factory and the imposter handle.
//!
//! `create_server` binds the socket, wires the resolution pipeline and
//! synthesizer together, and spawns the accept loop. The returned
//! [`ImposterHandle`] is what a management layer holds: recorded traffic,
//! live stub mutation, metadata, the actual bound port, and shutdown.

use std::sync::Arc;

use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use super::core::Imposter;
use super::handler::{handle_connection, ImposterContext};
use super::types::{ImposterConfig, ImposterError, RecordedRequest, Stub};
use crate::soap::{SoapSynthesizer, Wsdl};

/// Imposter metadata surfaced to the management layer.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ImposterMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A running imposter, as seen by the management layer.
pub struct ImposterHandle {
    imposter: Arc<Imposter>,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
    port: u16,
}

/// Bind a listener and start serving an imposter.
///
/// Resolves only once the OS confirms the bind; a requested port of zero
/// (or none) yields an OS-assigned ephemeral port, and the handle carries
/// the actual value. Bind failure rejects creation outright; no partial
/// imposter is returned.
pub async fn create_server(
    config: ImposterConfig,
    allow_injection: bool,
) -> Result<ImposterHandle, ImposterError> {
    let wsdl = Wsdl::parse(config.wsdl.as_deref())?;

    let bind_host = config.host.as_deref().unwrap_or("0.0.0.0").to_string();
    let requested_port = config.port.unwrap_or(0);
    debug!(host = %bind_host, port = requested_port, "binding imposter listener");

    let listener = TcpListener::bind((bind_host.as_str(), requested_port))
        .await
        .map_err(|e| ImposterError::BindError(requested_port, e.to_string()))?;
    let actual_port = listener
        .local_addr()
        .map_err(|e| ImposterError::BindError(requested_port, e.to_string()))?
        .port();

    // The log scope is established with the actual port; an ephemeral
    // allocation is observable both here and on the handle.
    let span = info_span!("imposter", protocol = %config.protocol, port = actual_port);
    if requested_port != actual_port {
        span.in_scope(|| {
            info!(
                requested_port,
                actual_port, "ephemeral port assigned, log scope renamed"
            );
        });
    }

    let mut config = config;
    config.port = Some(actual_port);
    if let Some(ref name) = config.name {
        span.in_scope(|| info!(name = %name, "imposter named"));
    }

    let imposter = Arc::new(Imposter::new(config, allow_injection));
    let synthesizer = Arc::new(SoapSynthesizer::new(wsdl));
    let context = Arc::new(ImposterContext {
        imposter: Arc::clone(&imposter),
        synthesizer,
    });

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    let connection_span = span.clone();

    let accept_task = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let context = Arc::clone(&context);
                                tokio::spawn(
                                    handle_connection(stream, addr, context)
                                        .instrument(connection_span.clone()),
                                );
                            }
                            Err(e) => {
                                error!(error = %e, "accept error");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("imposter shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span.clone()),
    );

    span.in_scope(|| info!("imposter open for business"));

    Ok(ImposterHandle {
        imposter,
        shutdown_tx,
        accept_task,
        port: actual_port,
    })
}

impl ImposterHandle {
    /// The actual bound port, which may differ from the requested one.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> ImposterMetadata {
        ImposterMetadata {
            name: self.imposter.config.name.clone(),
        }
    }

    pub fn config(&self) -> &ImposterConfig {
        &self.imposter.config
    }

    /// Live view of the recorded-requests sequence (arrival order).
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.imposter.recorded_requests()
    }

    /// Append a stub, concurrently with live traffic.
    pub fn add_stub(&self, stub: Stub) {
        self.imposter.add_stub(stub);
    }

    pub fn stubs(&self) -> Vec<Stub> {
        self.imposter.get_stubs()
    }

    pub fn request_count(&self) -> u64 {
        self.imposter.request_count()
    }

    /// Stop accepting new connections immediately.
    ///
    /// Synchronous from the caller's point of view: the shutdown signal is
    /// sent and the accept task is aborted before this returns, which drops
    /// the listener. In-flight requests on open connections complete or
    /// fail through their own fault boundary.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
        self.accept_task.abort();
        info!(port = self.port, "imposter closed");
    }
}
