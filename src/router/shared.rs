//! Thread-safe handle to a routing engine.
//!
//! Host callbacks for one router are totally ordered: every event runs under
//! one lock, so no two callbacks interleave.

use alloy::primitives::Address;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::router::engine::{RoutingEngine, Termination};
use crate::router::error::RouterResult;
use crate::streaming::driver::HostDriver;
use crate::streaming::host::StreamHost;
use crate::streaming::types::FlowRate;

/// Cloneable handle serializing access to one `RoutingEngine`.
pub struct SharedRouter<H> {
    inner: Arc<Mutex<RoutingEngine<H>>>,
}

impl<H> Clone for SharedRouter<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: StreamHost> SharedRouter<H> {
    pub fn new(engine: RoutingEngine<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    // Poisoning is ignored; the next audit records any drift left behind.
    fn lock(&self) -> MutexGuard<'_, RoutingEngine<H>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut RoutingEngine<H>) -> R) -> R {
        f(&mut self.lock())
    }

    /// Run a read-only query.
    pub fn read<R>(&self, f: impl FnOnce(&RoutingEngine<H>) -> R) -> R {
        f(&self.lock())
    }

    pub fn create_stream(
        &self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        self.with(|engine| HostDriver::new(engine).create_stream(contributor, token, rate, metadata))
    }

    pub fn update_stream(
        &self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        self.with(|engine| HostDriver::new(engine).update_stream(contributor, token, rate, metadata))
    }

    pub fn delete_stream(&self, contributor: Address, token: Address) -> Termination {
        self.with(|engine| HostDriver::new(engine).delete_stream(contributor, token))
    }
}
