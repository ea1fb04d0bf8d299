//! Recipient registry and distribution index.
//!
//! # Responsibilities
//! - Track which addresses may receive routed streams
//! - Hold the one-time distribution index and per-recipient share units
//!
//! # Design Decisions
//! - Admission only: recipients are never removed
//! - Owner checks live in the engine; the registry trusts its caller

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::router::error::{RecipientFault, RouterError, RouterResult};

/// A charity eligible to receive routed streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: Address,
    pub member: bool,
    /// Share units in the distribution index.
    pub units: U256,
}

/// The share-distribution index created by `initialize_distribution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionIndex {
    pub index_id: u32,
    pub initialized_at: u64,
}

/// Registered recipients keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRegistry {
    recipients: BTreeMap<Address, Recipient>,
    distribution: Option<DistributionIndex>,
}

impl RecipientRegistry {
    /// Admit a recipient with zero share units.
    pub fn register(&mut self, address: Address) -> RouterResult<()> {
        if self.recipients.contains_key(&address) {
            return Err(RouterError::AlreadyRegistered(address));
        }
        self.recipients.insert(
            address,
            Recipient {
                address,
                member: true,
                units: U256::ZERO,
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.recipients.get(address).is_some_and(|r| r.member)
    }

    pub fn get(&self, address: &Address) -> Option<&Recipient> {
        self.recipients.get(address)
    }

    /// Create the distribution index. Only once.
    pub fn initialize(&mut self, at: u64) -> RouterResult<DistributionIndex> {
        if self.distribution.is_some() {
            return Err(RouterError::AlreadyInitialized);
        }
        let index = DistributionIndex {
            index_id: 0,
            initialized_at: at,
        };
        self.distribution = Some(index);
        Ok(index)
    }

    pub fn distribution(&self) -> Option<DistributionIndex> {
        self.distribution
    }

    pub fn is_initialized(&self) -> bool {
        self.distribution.is_some()
    }

    /// Overwrite a recipient's share units.
    pub fn set_units(&mut self, address: Address, units: U256) -> RouterResult<()> {
        if !self.is_initialized() {
            return Err(RouterError::DistributionNotInitialized);
        }
        let recipient = self
            .recipients
            .get_mut(&address)
            .ok_or(RouterError::InvalidRecipient(RecipientFault::Unregistered(address)))?;
        recipient.units = units;
        Ok(())
    }

    pub fn total_units(&self) -> U256 {
        self.recipients
            .values()
            .fold(U256::ZERO, |acc, r| acc.saturating_add(r.units))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients.values()
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}
