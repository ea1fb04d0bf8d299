//! Anomalies recorded instead of failing a termination.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Anomaly records retained; older ones are dropped first.
pub const MAX_ANOMALIES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Termination for a contributor with no ledger entry.
    UnknownStream,
    /// Termination in a token the router does not route.
    ForeignToken,
    /// The outbound stream could not be reduced or closed.
    CompensationFailed,
    /// Ledger and outbound flows disagree after an event.
    InvariantDrift,
}

impl AnomalyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::UnknownStream => "unknown_stream",
            AnomalyKind::ForeignToken => "foreign_token",
            AnomalyKind::CompensationFailed => "compensation_failed",
            AnomalyKind::InvariantDrift => "invariant_drift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub sequence: u64,
    pub at: u64,
    pub kind: AnomalyKind,
    pub contributor: Address,
    pub recipient: Option<Address>,
    pub detail: String,
}
