//! Stream ledger: the router's own record of every inbound stream.
//!
//! Metadata on an event is authoritative on creation and update. On deletion
//! the host may not repeat the original payload, so the ledger is what tells
//! the engine which outbound stream to reduce.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::streaming::types::FlowRate;

/// One contributor's stream into the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundStream {
    pub contributor: Address,
    pub recipient: Address,
    pub rate: FlowRate,
    /// Engine sequence number of the last event applied to this entry.
    pub sequence: u64,
    pub updated_at: u64,
}

/// Inbound streams keyed by contributor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLedger {
    entries: BTreeMap<Address, InboundStream>,
}

impl StreamLedger {
    /// Insert or replace the entry for `stream.contributor`.
    pub fn record_inbound(&mut self, stream: InboundStream) -> Option<InboundStream> {
        self.entries.insert(stream.contributor, stream)
    }

    /// Remove and return a contributor's entry.
    pub fn remove_inbound(&mut self, contributor: &Address) -> Option<InboundStream> {
        self.entries.remove(contributor)
    }

    /// Last known (recipient, rate) for a contributor.
    pub fn rate_for(&self, contributor: &Address) -> Option<(Address, FlowRate)> {
        self.entries.get(contributor).map(|s| (s.recipient, s.rate))
    }

    pub fn get(&self, contributor: &Address) -> Option<&InboundStream> {
        self.entries.get(contributor)
    }

    /// Sum of inbound rates routed to `recipient`.
    pub fn total_for(&self, recipient: &Address) -> FlowRate {
        self.entries
            .values()
            .filter(|s| s.recipient == *recipient)
            .map(|s| s.rate)
            .sum()
    }

    /// Sum of all inbound rates.
    pub fn total_inbound(&self) -> FlowRate {
        self.entries.values().map(|s| s.rate).sum()
    }

    /// Inbound totals grouped by recipient.
    pub fn by_recipient(&self) -> BTreeMap<Address, FlowRate> {
        let mut totals: BTreeMap<Address, FlowRate> = BTreeMap::new();
        for stream in self.entries.values() {
            let total = totals.entry(stream.recipient).or_default();
            *total = FlowRate::new(total.get() + stream.rate.get());
        }
        totals
    }

    pub fn iter(&self) -> impl Iterator<Item = &InboundStream> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
