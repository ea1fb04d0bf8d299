//! In-process streaming host.
//!
//! Keeps every flow of one token in memory. Used by the router node and by
//! tests; `refuse_receiver` injects the "recipient can no longer receive"
//! failure that the termination path has to survive.

use alloy::primitives::Address;
use std::collections::{BTreeMap, BTreeSet};

use crate::streaming::host::StreamHost;
use crate::streaming::types::{FlowRate, HostError, HostFlow, HostResult};

/// A single-token host holding flows in a map.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    token: Address,
    flows: BTreeMap<(Address, Address), FlowRate>,
    refusing: BTreeSet<Address>,
}

impl MemoryHost {
    /// Create an empty host for `token`.
    pub fn new(token: Address) -> Self {
        Self {
            token,
            flows: BTreeMap::new(),
            refusing: BTreeSet::new(),
        }
    }

    /// Rebuild a host from persisted flows. Invalid entries are skipped.
    pub fn with_flows(token: Address, flows: impl IntoIterator<Item = HostFlow>) -> Self {
        let mut host = Self::new(token);
        for flow in flows {
            if let Err(e) = host.create_flow(flow.sender, flow.receiver, flow.rate) {
                tracing::warn!(error = %e, "skipping persisted flow");
            }
        }
        host
    }

    /// Every open flow, for persistence.
    pub fn snapshot_flows(&self) -> Vec<HostFlow> {
        self.flows()
            .map(|(sender, receiver, rate)| HostFlow { sender, receiver, rate })
            .collect()
    }

    /// Make `receiver` refuse new flows and rate changes.
    pub fn refuse_receiver(&mut self, receiver: Address) {
        self.refusing.insert(receiver);
    }

    /// Undo `refuse_receiver`.
    pub fn accept_receiver(&mut self, receiver: Address) {
        self.refusing.remove(&receiver);
    }

    /// All flows currently open.
    pub fn flows(&self) -> impl Iterator<Item = (Address, Address, FlowRate)> + '_ {
        self.flows.iter().map(|(&(s, r), &rate)| (s, r, rate))
    }

    /// Flows sent by `sender`, keyed by receiver.
    pub fn outgoing(&self, sender: Address) -> BTreeMap<Address, FlowRate> {
        self.flows
            .iter()
            .filter(|((s, _), _)| *s == sender)
            .map(|(&(_, r), &rate)| (r, rate))
            .collect()
    }

    fn check_rate(rate: FlowRate) -> HostResult<()> {
        if rate.is_positive() && rate.is_representable() {
            Ok(())
        } else {
            Err(HostError::InvalidRate(rate))
        }
    }

    fn check_receiver(&self, receiver: Address) -> HostResult<()> {
        if self.refusing.contains(&receiver) {
            return Err(HostError::ReceiverRejected(receiver));
        }
        Ok(())
    }
}

impl StreamHost for MemoryHost {
    fn token(&self) -> Address {
        self.token
    }

    fn create_flow(&mut self, sender: Address, receiver: Address, rate: FlowRate) -> HostResult<()> {
        if sender == receiver {
            return Err(HostError::SelfFlow(sender));
        }
        Self::check_rate(rate)?;
        self.check_receiver(receiver)?;
        if self.flows.contains_key(&(sender, receiver)) {
            return Err(HostError::FlowExists { sender, receiver });
        }
        self.flows.insert((sender, receiver), rate);
        tracing::trace!(%sender, %receiver, %rate, "flow created");
        Ok(())
    }

    fn update_flow(&mut self, sender: Address, receiver: Address, rate: FlowRate) -> HostResult<()> {
        Self::check_rate(rate)?;
        self.check_receiver(receiver)?;
        match self.flows.get_mut(&(sender, receiver)) {
            Some(current) => {
                *current = rate;
                tracing::trace!(%sender, %receiver, %rate, "flow updated");
                Ok(())
            }
            None => Err(HostError::FlowNotFound { sender, receiver }),
        }
    }

    fn delete_flow(&mut self, sender: Address, receiver: Address) -> HostResult<FlowRate> {
        let rate = self
            .flows
            .remove(&(sender, receiver))
            .ok_or(HostError::FlowNotFound { sender, receiver })?;
        tracing::trace!(%sender, %receiver, %rate, "flow deleted");
        Ok(rate)
    }

    fn flow_rate(&self, sender: Address, receiver: Address) -> FlowRate {
        self.flows
            .get(&(sender, receiver))
            .copied()
            .unwrap_or(FlowRate::ZERO)
    }

    fn net_flow(&self, account: Address) -> FlowRate {
        self.flows
            .iter()
            .map(|(&(s, r), &rate)| {
                if r == account {
                    rate
                } else if s == account {
                    FlowRate::new(-rate.get())
                } else {
                    FlowRate::ZERO
                }
            })
            .sum()
    }
}
