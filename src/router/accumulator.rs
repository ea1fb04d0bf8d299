//! Contribution accumulator.
//!
//! # Responsibilities
//! - Keep, per (recipient, contributor), the amount streamed so far
//! - Track the rate currently open for each pair so the running total can be
//!   read at any instant
//!
//! # Design Decisions
//! - Amounts only grow; settling moves accrued flow into `streamed`
//! - Credit attributed to a recipient equals the time integral of the rates
//!   routed to it
//! - Keyed recipient-first so `contributors_for` is a single map lookup

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::streaming::types::FlowRate;

/// One contributor's history with one recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// Settled amount in token units.
    pub streamed: U256,
    /// Rate currently accruing; zero once the stream stops or moves away.
    pub rate: FlowRate,
    /// When the current accrual started.
    pub since: u64,
}

impl ContributionRecord {
    /// Amount accrued since the last settlement.
    pub fn accrued(&self, now: u64) -> U256 {
        if !self.rate.is_positive() || now <= self.since {
            return U256::ZERO;
        }
        U256::from(self.rate.get() as u128).saturating_mul(U256::from(now - self.since))
    }

    /// Settled plus accrued amount.
    pub fn total_at(&self, now: u64) -> U256 {
        self.streamed.saturating_add(self.accrued(now))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionAccumulator {
    records: BTreeMap<Address, BTreeMap<Address, ContributionRecord>>,
}

impl ContributionAccumulator {
    /// Add `amount` to a contributor's settled total for `recipient`.
    pub fn credit(&mut self, contributor: Address, recipient: Address, amount: U256) {
        let record = self.record_mut(contributor, recipient);
        record.streamed = record.streamed.saturating_add(amount);
    }

    /// Settle what has accrued and keep accruing at the same rate from `at`.
    /// Returns the amount credited.
    pub fn settle(&mut self, contributor: Address, recipient: Address, at: u64) -> U256 {
        let Some(record) = self
            .records
            .get_mut(&recipient)
            .and_then(|m| m.get_mut(&contributor))
        else {
            return U256::ZERO;
        };
        let accrued = record.accrued(at);
        record.streamed = record.streamed.saturating_add(accrued);
        record.since = at.max(record.since);
        accrued
    }

    /// Settle, then accrue at `rate` from `at`.
    pub fn open(&mut self, contributor: Address, recipient: Address, rate: FlowRate, at: u64) {
        self.settle(contributor, recipient, at);
        let record = self.record_mut(contributor, recipient);
        record.rate = rate;
        record.since = at.max(record.since);
    }

    /// Settle and stop accruing. Returns the amount credited.
    pub fn close(&mut self, contributor: Address, recipient: Address, at: u64) -> U256 {
        let credited = self.settle(contributor, recipient, at);
        if let Some(record) = self
            .records
            .get_mut(&recipient)
            .and_then(|m| m.get_mut(&contributor))
        {
            record.rate = FlowRate::ZERO;
        }
        credited
    }

    /// Settled total for `recipient`.
    pub fn total_for(&self, recipient: &Address) -> U256 {
        self.records.get(recipient).map_or(U256::ZERO, |m| {
            m.values()
                .fold(U256::ZERO, |acc, r| acc.saturating_add(r.streamed))
        })
    }

    /// Settled plus still-accruing total for `recipient` at `now`.
    pub fn total_at(&self, recipient: &Address, now: u64) -> U256 {
        self.records.get(recipient).map_or(U256::ZERO, |m| {
            m.values()
                .fold(U256::ZERO, |acc, r| acc.saturating_add(r.total_at(now)))
        })
    }

    /// Everyone who has ever contributed to `recipient`.
    pub fn contributors_for(&self, recipient: &Address) -> BTreeSet<Address> {
        self.records
            .get(recipient)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Per-contributor totals for `recipient` at `now`.
    pub fn contributions_at(&self, recipient: &Address, now: u64) -> BTreeMap<Address, U256> {
        self.records
            .get(recipient)
            .map(|m| m.iter().map(|(c, r)| (*c, r.total_at(now))).collect())
            .unwrap_or_default()
    }

    pub fn contribution(&self, contributor: &Address, recipient: &Address) -> Option<&ContributionRecord> {
        self.records.get(recipient).and_then(|m| m.get(contributor))
    }

    /// Sum of rates currently accruing toward `recipient`.
    pub fn open_rate_for(&self, recipient: &Address) -> FlowRate {
        self.records
            .get(recipient)
            .map(|m| m.values().map(|r| r.rate).sum())
            .unwrap_or_default()
    }

    /// Recipients with at least one record.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.records.keys()
    }

    fn record_mut(&mut self, contributor: Address, recipient: Address) -> &mut ContributionRecord {
        self.records
            .entry(recipient)
            .or_default()
            .entry(contributor)
            .or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    #[test]
    fn test_credit_is_monotonic() {
        let mut acc = ContributionAccumulator::default();
        acc.credit(addr(1), addr(10), U256::from(5));
        acc.credit(addr(1), addr(10), U256::from(7));
        acc.credit(addr(2), addr(10), U256::from(1));

        assert_eq!(acc.total_for(&addr(10)), U256::from(13));
        assert_eq!(acc.contributors_for(&addr(10)).len(), 2);
        assert!(acc.contributors_for(&addr(11)).is_empty());
    }

    #[test]
    fn test_time_integral_of_rates() {
        let mut acc = ContributionAccumulator::default();
        acc.open(addr(1), addr(10), FlowRate::new(100), 0);
        // 100/s for 10s, then 200/s for 5s
        acc.open(addr(1), addr(10), FlowRate::new(200), 10);
        assert_eq!(acc.total_for(&addr(10)), U256::from(1000));
        assert_eq!(acc.total_at(&addr(10), 12), U256::from(1400));

        let credited = acc.close(addr(1), addr(10), 15);
        assert_eq!(credited, U256::from(1000));
        assert_eq!(acc.total_for(&addr(10)), U256::from(2000));
        // closed: no more accrual
        assert_eq!(acc.total_at(&addr(10), 100), U256::from(2000));
        assert_eq!(acc.open_rate_for(&addr(10)), FlowRate::ZERO);
    }

    #[test]
    fn test_reopen_with_earlier_timestamp_does_not_recount() {
        let mut acc = ContributionAccumulator::default();
        acc.open(addr(1), addr(10), FlowRate::new(10), 100);
        // clock stepped back before the next event
        acc.open(addr(1), addr(10), FlowRate::new(10), 90);
        assert_eq!(acc.contribution(&addr(1), &addr(10)).unwrap().since, 100);
        assert_eq!(acc.total_at(&addr(10), 110), U256::from(100));

        acc.close(addr(1), addr(10), 80);
        acc.open(addr(1), addr(10), FlowRate::new(5), 95);
        assert_eq!(acc.total_at(&addr(10), 110), U256::from(50));
    }

    #[test]
    fn test_settle_unknown_pair_is_noop() {
        let mut acc = ContributionAccumulator::default();
        assert_eq!(acc.settle(addr(1), addr(2), 50), U256::ZERO);
        assert!(acc.contribution(&addr(1), &addr(2)).is_none());
    }

    #[test]
    fn test_contributions_at() {
        let mut acc = ContributionAccumulator::default();
        acc.open(addr(1), addr(10), FlowRate::new(3), 0);
        acc.open(addr(2), addr(10), FlowRate::new(4), 5);

        let snapshot = acc.contributions_at(&addr(10), 10);
        assert_eq!(snapshot[&addr(1)], U256::from(30));
        assert_eq!(snapshot[&addr(2)], U256::from(20));
        assert_eq!(acc.open_rate_for(&addr(10)), FlowRate::new(7));
        assert_eq!(acc.recipients().count(), 1);
    }
}
