//! Imposter management: the protocol-server abstraction at the heart of
//! Mimic.
//!
//! ## Module Structure
//!
//! - `types`: configuration, stub, descriptor, and error definitions
//! - `core`: per-imposter shared state (stubs, recorded requests)
//! - `resolver`: the resolution pipeline contract and stub resolver
//! - `handler`: per-connection serving and the per-request fault boundary
//! - `server`: listener factory and the imposter handle
//! - `manager`: lifecycle registry across imposters
//! - `validator`: socketless dry-run validation of configurations

mod core;
mod handler;
mod manager;
mod resolver;
mod server;
pub mod types;
mod validator;


pub use self::core::Imposter;
pub use manager::ImposterManager;
pub use resolver::{ResponseResolver, StubSet};
pub use server::{create_server, ImposterHandle, ImposterMetadata};
pub use types::{
    ErrorDetails, HttpEnvelope, ImposterConfig, ImposterError, RecordedRequest, RequestError,
    ResponseDescriptor, ResponseTemplate, Stub, StubResponse,
};
pub use validator::{DryRunValidator, ValidationError};

use validator::joined_message;

/// The per-protocol surface a management layer consumes: a name, a server
/// factory, and a dry-run validator. Every protocol exposes this same
/// shape.
pub struct SoapProtocol {
    allow_injection: bool,
    record_requests: bool,
}

impl SoapProtocol {
    pub fn initialize(allow_injection: bool, record_requests: bool) -> Self {
        Self {
            allow_injection,
            record_requests,
        }
    }

    pub fn name(&self) -> &'static str {
        "soap"
    }

    /// Validate the configuration, then bind and start the imposter.
    pub async fn create(
        &self,
        mut config: ImposterConfig,
    ) -> Result<ImposterHandle, ImposterError> {
        if let Err(errors) = self.validator().validate(&config) {
            return Err(ImposterError::InvalidStubs(joined_message(&errors)));
        }
        config.record_requests = config.record_requests || self.record_requests;
        create_server(config, self.allow_injection).await
    }

    pub fn validator(&self) -> DryRunValidator {
        DryRunValidator::create(self.allow_injection)
    }
}
