//! Lifecycle management for multiple imposters.
//!
//! Each imposter owns its own listener; the manager is the port-keyed
//! registry a management layer drives.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::server::ImposterHandle;
use super::types::{ImposterConfig, ImposterError, Stub};
use super::SoapProtocol;

pub struct ImposterManager {
    protocol: SoapProtocol,
    /// Active imposters by actual bound port.
    imposters: RwLock<HashMap<u16, Arc<ImposterHandle>>>,
}

impl ImposterManager {
    pub fn new(allow_injection: bool, record_requests: bool) -> Self {
        Self {
            protocol: SoapProtocol::initialize(allow_injection, record_requests),
            imposters: RwLock::new(HashMap::new()),
        }
    }

    /// Create and start an imposter; returns its handle carrying the actual
    /// bound port.
    pub async fn create_imposter(
        &self,
        config: ImposterConfig,
    ) -> Result<Arc<ImposterHandle>, ImposterError> {
        if config.protocol != self.protocol.name() {
            return Err(ImposterError::InvalidProtocol(config.protocol.clone()));
        }

        if let Some(port) = config.port.filter(|p| *p != 0) {
            if self.imposters.read().contains_key(&port) {
                return Err(ImposterError::PortInUse(port));
            }
        }

        let handle = Arc::new(self.protocol.create(config).await?);
        let port = handle.port();
        self.imposters.write().insert(port, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get_imposter(&self, port: u16) -> Result<Arc<ImposterHandle>, ImposterError> {
        self.imposters
            .read()
            .get(&port)
            .cloned()
            .ok_or(ImposterError::NotFound(port))
    }

    pub fn list_imposters(&self) -> Vec<Arc<ImposterHandle>> {
        self.imposters.read().values().cloned().collect()
    }

    /// Close an imposter and forget it.
    pub fn delete_imposter(&self, port: u16) -> Result<ImposterConfig, ImposterError> {
        let handle = {
            let mut imposters = self.imposters.write();
            imposters.remove(&port).ok_or(ImposterError::NotFound(port))?
        };
        handle.close();
        info!(port, "imposter deleted");
        Ok(handle.config().clone())
    }

    pub fn delete_all(&self) -> Vec<ImposterConfig> {
        let ports: Vec<u16> = self.imposters.read().keys().copied().collect();
        ports
            .into_iter()
            .filter_map(|port| self.delete_imposter(port).ok())
            .collect()
    }

    pub fn add_stub(&self, port: u16, stub: Stub) -> Result<(), ImposterError> {
        let handle = self.get_imposter(port)?;
        handle.add_stub(stub);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.imposters.read().len()
    }
}
