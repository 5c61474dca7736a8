//! Core imposter state shared across concurrent requests.
//!
//! The stub set and the recorded-request sequence are the only state shared
//! between in-flight requests for one imposter; both sit behind their own
//! locks and tolerate concurrent reads and appends.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::resolver::StubSet;
use super::types::{ImposterConfig, RecordedRequest, Stub};

pub struct Imposter {
    pub config: ImposterConfig,
    /// Mutable stub set; the management layer appends concurrently with
    /// live traffic.
    pub stubs: StubSet,
    /// Canonical requests in arrival order, populated only in record mode.
    recorded_requests: RwLock<Vec<RecordedRequest>>,
    request_count: AtomicU64,
}

impl Imposter {
    pub fn new(config: ImposterConfig, allow_injection: bool) -> Self {
        let stubs = StubSet::new(config.stubs.clone(), allow_injection);
        Self {
            config,
            stubs,
            recorded_requests: RwLock::new(Vec::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Append a canonical request to the recorded sequence.
    ///
    /// Called after normalization and before resolution; the write lock
    /// makes the append atomic and order-preserving relative to appends
    /// from sibling connections.
    pub fn record_request(&self, request: RecordedRequest) {
        if self.config.record_requests {
            self.recorded_requests.write().push(request);
        }
    }

    /// Snapshot of the recorded requests, in arrival order.
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.recorded_requests.read().clone()
    }

    pub fn add_stub(&self, stub: Stub) {
        self.stubs.add_stub(stub);
    }

    pub fn get_stubs(&self) -> Vec<Stub> {
        self.stubs.stubs()
    }

    pub fn increment_request_count(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }
}
