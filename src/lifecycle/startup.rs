//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the in-process host and routing engine from config
//! - Restore persisted state when a snapshot exists
//!
//! # Design Decisions
//! - Fail fast: an unreadable snapshot is fatal rather than silently reset
//! - A missing snapshot file means a fresh router

use crate::config::RouterConfig;
use crate::router::engine::RoutingEngine;
use crate::router::shared::SharedRouter;
use crate::router::snapshot::{RouterSnapshot, SnapshotError};
use crate::streaming::memory::MemoryHost;

/// Create the node's router, restoring the snapshot at `snapshot_path` if any.
pub fn build_router(config: &RouterConfig) -> Result<SharedRouter<MemoryHost>, SnapshotError> {
    let snapshot = match &config.snapshot_path {
        Some(path) => RouterSnapshot::load_from_file(path)?,
        None => None,
    };

    let engine = match snapshot {
        Some(mut snapshot) => {
            let flows = std::mem::take(&mut snapshot.host_flows);
            let host = MemoryHost::with_flows(config.token, flows);
            let mut engine = RoutingEngine::new(config, host);
            engine.restore(snapshot);
            if let Err(e) = engine.check_invariants() {
                tracing::warn!(error = %e, "Restored state does not reconcile");
            }
            engine
        }
        None => RoutingEngine::new(config, MemoryHost::new(config.token)),
    };

    tracing::info!(
        router = %config.address,
        token = %config.token,
        recipients = engine.registry().len(),
        streams = engine.ledger().len(),
        "Router ready"
    );
    Ok(SharedRouter::new(engine))
}

/// Capture the engine and its host flows.
pub fn capture_snapshot(router: &SharedRouter<MemoryHost>) -> RouterSnapshot {
    router.read(|engine| {
        let mut snapshot = engine.snapshot();
        snapshot.host_flows = engine.host().snapshot_flows();
        snapshot
    })
}
