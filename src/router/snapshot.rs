//! Snapshot persistence for router state.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use crate::router::accumulator::ContributionAccumulator;
use crate::router::anomaly::Anomaly;
use crate::router::ledger::StreamLedger;
use crate::router::registry::RecipientRegistry;
use crate::streaming::types::HostFlow;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Committed router state between two events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    pub sequence: u64,
    pub registry: RecipientRegistry,
    pub ledger: StreamLedger,
    pub accumulator: ContributionAccumulator,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
    /// Flows held by an in-process host; empty when the host is external.
    #[serde(default)]
    pub host_flows: Vec<HostFlow>,
}

impl RouterSnapshot {
    /// Load a snapshot, or `None` if the file does not exist yet.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        let snapshot: RouterSnapshot = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %path.display(),
            recipients = snapshot.registry.len(),
            streams = snapshot.ledger.len(),
            "Loaded router snapshot"
        );
        Ok(Some(snapshot))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        tracing::info!(
            path = %path.display(),
            sequence = self.sequence,
            "Saved router snapshot"
        );
        Ok(())
    }
}
