//! Matching-weight strategies over the contribution accumulator.
//!
//! The payout formula is pluggable. `QuadraticMatching` treats each
//! contributor's lifetime total toward a recipient as one contribution;
//! `ProportionalMatching` is the plain sum, useful as a baseline.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::router::accumulator::ContributionAccumulator;

/// Computes a matching weight per recipient.
pub trait MatchingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn weights(&self, contributions: &ContributionAccumulator, now: u64) -> BTreeMap<Address, U256>;
}

/// `(sum of sqrt(c_i))^2` over each contributor's lifetime total.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticMatching;

impl MatchingStrategy for QuadraticMatching {
    fn name(&self) -> &'static str {
        "quadratic"
    }

    fn weights(&self, contributions: &ContributionAccumulator, now: u64) -> BTreeMap<Address, U256> {
        contributions
            .recipients()
            .map(|recipient| {
                let root_sum = contributions
                    .contributions_at(recipient, now)
                    .values()
                    .fold(U256::ZERO, |acc, amount| acc.saturating_add(amount.root(2)));
                (*recipient, root_sum.saturating_mul(root_sum))
            })
            .collect()
    }
}

/// Weight equals the total streamed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalMatching;

impl MatchingStrategy for ProportionalMatching {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn weights(&self, contributions: &ContributionAccumulator, now: u64) -> BTreeMap<Address, U256> {
        contributions
            .recipients()
            .map(|recipient| (*recipient, contributions.total_at(recipient, now)))
            .collect()
    }
}

/// Strategy names accepted in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingKind {
    #[default]
    Quadratic,
    Proportional,
}

impl MatchingKind {
    pub fn build(self) -> Box<dyn MatchingStrategy> {
        match self {
            MatchingKind::Quadratic => Box::new(QuadraticMatching),
            MatchingKind::Proportional => Box::new(ProportionalMatching),
        }
    }
}
