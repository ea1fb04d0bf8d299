//! Lifecycle-callback state machine.
//!
//! # States (per contributor)
//! ```text
//! NoStream --created--> Routed(recipient) --updated--> Routed(recipient')
//!                               |
//!                               +--terminated--> NoStream
//! ```
//!
//! # Invariants
//! - For every recipient, the outbound flow equals the sum of ledger rates
//!   targeting it; outbound targets are always recomputed from the ledger
//! - Router net flow is zero after every acknowledged create/update
//! - Creation and update either fully apply or leave no trace
//! - Termination always acknowledges; failures become anomalies

use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::observability::metrics;
use crate::router::accumulator::ContributionAccumulator;
use crate::router::anomaly::{Anomaly, AnomalyKind, MAX_ANOMALIES};
use crate::router::clock::{Clock, SystemClock};
use crate::router::error::{RecipientFault, RouterError, RouterResult};
use crate::router::ledger::{InboundStream, StreamLedger};
use crate::router::matching::MatchingStrategy;
use crate::router::metadata::{decode_intent, MalformedReason, Resolution};
use crate::router::registry::{DistributionIndex, RecipientRegistry};
use crate::router::snapshot::RouterSnapshot;
use crate::streaming::host::StreamHost;
use crate::streaming::types::FlowRate;

/// How a termination was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Termination {
    /// Outbound stream reduced or closed as expected.
    Closed { recipient: Address, rate: FlowRate },
    /// Ledger entry removed, but the outbound stream could not be adjusted.
    Degraded { recipient: Address, rate: FlowRate },
    /// Nothing to do: unknown contributor or foreign token.
    Ignored,
}

impl Termination {
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Closed { .. } => "closed",
            Termination::Degraded { .. } => "degraded",
            Termination::Ignored => "ignored",
        }
    }
}

/// The router: registry, ledger and accumulator driven by host callbacks.
pub struct RoutingEngine<H> {
    owner: Address,
    address: Address,
    token: Address,
    host: H,
    clock: Arc<dyn Clock>,
    registry: RecipientRegistry,
    ledger: StreamLedger,
    accumulator: ContributionAccumulator,
    anomalies: Vec<Anomaly>,
    sequence: u64,
    drift: Option<String>,
}

impl<H: StreamHost> RoutingEngine<H> {
    pub fn new(config: &RouterConfig, host: H) -> Self {
        Self::with_clock(config, host, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RouterConfig, host: H, clock: Arc<dyn Clock>) -> Self {
        Self {
            owner: config.owner,
            address: config.address,
            token: config.token,
            host,
            clock,
            registry: RecipientRegistry::default(),
            ledger: StreamLedger::default(),
            accumulator: ContributionAccumulator::default(),
            anomalies: Vec::new(),
            sequence: 0,
            drift: None,
        }
    }

    /// Replace the router's state with a persisted snapshot.
    pub fn restore(&mut self, snapshot: RouterSnapshot) {
        self.sequence = snapshot.sequence;
        self.registry = snapshot.registry;
        self.ledger = snapshot.ledger;
        self.accumulator = snapshot.accumulator;
        self.anomalies = snapshot.anomalies;
        trim_oldest(&mut self.anomalies);
        self.drift = None;
        metrics::record_active_streams(self.ledger.len());
    }

    /// Committed state, without host flows.
    pub fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            sequence: self.sequence,
            registry: self.registry.clone(),
            ledger: self.ledger.clone(),
            accumulator: self.accumulator.clone(),
            anomalies: self.anomalies.clone(),
            host_flows: Vec::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Admin surface
    // ---------------------------------------------------------------------

    pub fn register_recipient(&mut self, caller: Address, recipient: Address) -> RouterResult<()> {
        self.ensure_owner(caller)?;
        if recipient.is_zero() {
            return Err(RouterError::InvalidRecipient(RecipientFault::Malformed(
                MalformedReason::ZeroAddress,
            )));
        }
        if recipient == self.address {
            return Err(RouterError::InvalidRecipient(RecipientFault::SelfRoute));
        }
        self.registry.register(recipient)?;
        tracing::info!(%recipient, total = self.registry.len(), "Recipient registered");
        Ok(())
    }

    pub fn initialize_distribution(&mut self, caller: Address) -> RouterResult<DistributionIndex> {
        self.ensure_owner(caller)?;
        let index = self.registry.initialize(self.clock.now())?;
        tracing::info!(index_id = index.index_id, "Distribution index initialized");
        Ok(index)
    }

    /// Recompute share units from the accumulator.
    ///
    /// Each registered recipient gets `weight / unit_scale` units; recipients
    /// without contributions drop to zero.
    pub fn refresh_distribution(
        &mut self,
        caller: Address,
        strategy: &dyn MatchingStrategy,
        unit_scale: U256,
    ) -> RouterResult<BTreeMap<Address, U256>> {
        self.ensure_owner(caller)?;
        if !self.registry.is_initialized() {
            return Err(RouterError::DistributionNotInitialized);
        }
        let scale = unit_scale.max(U256::from(1));
        let weights = strategy.weights(&self.accumulator, self.clock.now());
        let recipients: Vec<Address> = self.registry.iter().map(|r| r.address).collect();

        let mut units = BTreeMap::new();
        for recipient in recipients {
            let share = weights.get(&recipient).copied().unwrap_or_default() / scale;
            self.registry.set_units(recipient, share)?;
            units.insert(recipient, share);
        }
        tracing::info!(
            strategy = strategy.name(),
            recipients = units.len(),
            "Distribution units refreshed"
        );
        Ok(units)
    }

    // ---------------------------------------------------------------------
    // Host lifecycle callbacks
    // ---------------------------------------------------------------------

    /// A contributor opened a stream to the router.
    pub fn on_stream_created(
        &mut self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        let result = self.handle_created(contributor, token, rate, metadata);
        self.finish("created", contributor, &result);
        result
    }

    /// A contributor changed the rate or target of its stream.
    pub fn on_stream_updated(
        &mut self,
        contributor: Address,
        token: Address,
        new_rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        let result = self.handle_updated(contributor, token, new_rate, metadata);
        self.finish("updated", contributor, &result);
        result
    }

    /// A contributor's stream ended. Always acknowledged.
    pub fn on_stream_terminated(&mut self, contributor: Address, token: Address) -> Termination {
        let termination = self.handle_terminated(contributor, token);
        metrics::record_event("terminated", termination.label());
        metrics::record_active_streams(self.ledger.len());
        self.audit(contributor);
        termination
    }

    fn handle_created(
        &mut self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        self.ensure_token(token)?;
        ensure_rate(rate)?;
        if self.ledger.get(&contributor).is_some() {
            return Err(RouterError::StreamExists(contributor));
        }
        let recipient = decode_intent(metadata)
            .resolve(&self.registry)
            .registered()
            .map_err(RouterError::InvalidRecipient)?;
        if !self.registry.is_initialized() {
            return Err(RouterError::DistributionNotInitialized);
        }

        let target = self
            .ledger
            .total_for(&recipient)
            .checked_add(rate)
            .ok_or(RouterError::RateOverflow { recipient })?;
        self.apply_outbound(recipient, target)?;

        let now = self.clock.now();
        let sequence = self.next_sequence();
        self.ledger.record_inbound(InboundStream {
            contributor,
            recipient,
            rate,
            sequence,
            updated_at: now,
        });
        self.accumulator.open(contributor, recipient, rate, now);

        tracing::info!(%contributor, %recipient, %rate, sequence, "Stream routed");
        Ok(())
    }

    fn handle_updated(
        &mut self,
        contributor: Address,
        token: Address,
        new_rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        self.ensure_token(token)?;
        ensure_rate(new_rate)?;
        let existing = *self
            .ledger
            .get(&contributor)
            .ok_or(RouterError::UnknownStream(contributor))?;

        let target = match decode_intent(metadata).resolve(&self.registry) {
            Resolution::Registered(recipient) => recipient,
            Resolution::Unregistered(recipient) => {
                return Err(RouterError::InvalidRecipient(RecipientFault::Unregistered(recipient)));
            }
            Resolution::Malformed(reason) => {
                tracing::debug!(%contributor, %reason, "Undecodable update metadata, keeping recipient");
                existing.recipient
            }
            Resolution::Absent => existing.recipient,
        };

        let now = self.clock.now();
        if target == existing.recipient {
            let desired = self
                .ledger
                .total_for(&target)
                .checked_sub(existing.rate)
                .and_then(|r| r.checked_add(new_rate))
                .ok_or(RouterError::RateOverflow { recipient: target })?;
            self.apply_outbound(target, desired)?;
            self.accumulator.open(contributor, target, new_rate, now);
        } else {
            if !self.registry.is_initialized() {
                return Err(RouterError::DistributionNotInitialized);
            }
            self.switch_recipient(&existing, target, new_rate)?;
            self.accumulator.close(contributor, existing.recipient, now);
            self.accumulator.open(contributor, target, new_rate, now);
        }

        let sequence = self.next_sequence();
        self.ledger.record_inbound(InboundStream {
            contributor,
            recipient: target,
            rate: new_rate,
            sequence,
            updated_at: now,
        });

        tracing::info!(
            %contributor,
            from = %existing.recipient,
            to = %target,
            old_rate = %existing.rate,
            %new_rate,
            sequence,
            "Stream updated"
        );
        Ok(())
    }

    /// Move a contributor's flow from one recipient to another.
    ///
    /// Both new outbound rates are computed and validated before either is
    /// applied. The increase to `to` goes first; if the decrease to `from`
    /// then fails, only `to` is rolled back.
    fn switch_recipient(
        &mut self,
        existing: &InboundStream,
        to: Address,
        new_rate: FlowRate,
    ) -> RouterResult<()> {
        let from = existing.recipient;
        let partial = |reason: String| RouterError::PartialRouteFailure { from, to, reason };

        let from_target = self
            .ledger
            .total_for(&from)
            .checked_sub(existing.rate)
            .filter(|r| !r.is_negative())
            .ok_or_else(|| partial(format!("outbound to {from} cannot absorb a decrease of {}", existing.rate)))?;
        let to_target = self
            .ledger
            .total_for(&to)
            .checked_add(new_rate)
            .ok_or_else(|| partial(format!("outbound to {to} would overflow")))?;
        let to_before = self.host.flow_rate(self.address, to);

        self.apply_outbound(to, to_target)
            .map_err(|e| partial(e.to_string()))?;

        if let Err(err) = self.apply_outbound(from, from_target) {
            if let Err(revert) = self.apply_outbound(to, to_before) {
                tracing::error!(%from, %to, error = %revert, "Could not roll back outbound stream after failed switch");
                self.record_anomaly(
                    AnomalyKind::CompensationFailed,
                    existing.contributor,
                    Some(to),
                    format!("rollback after failed switch: {revert}"),
                );
            }
            return Err(partial(err.to_string()));
        }
        Ok(())
    }

    fn handle_terminated(&mut self, contributor: Address, token: Address) -> Termination {
        if token != self.token {
            self.record_anomaly(
                AnomalyKind::ForeignToken,
                contributor,
                None,
                format!("termination in token {token}"),
            );
            return Termination::Ignored;
        }
        let Some(stream) = self.ledger.remove_inbound(&contributor) else {
            self.record_anomaly(
                AnomalyKind::UnknownStream,
                contributor,
                None,
                "termination without a ledger entry".to_string(),
            );
            return Termination::Ignored;
        };

        let now = self.clock.now();
        let sequence = self.next_sequence();
        self.accumulator.close(contributor, stream.recipient, now);

        let target = self.ledger.total_for(&stream.recipient);
        match self.apply_outbound(stream.recipient, target) {
            Ok(()) => {
                tracing::info!(
                    %contributor,
                    recipient = %stream.recipient,
                    rate = %stream.rate,
                    sequence,
                    "Stream closed"
                );
                Termination::Closed {
                    recipient: stream.recipient,
                    rate: stream.rate,
                }
            }
            Err(err) => {
                self.record_anomaly(
                    AnomalyKind::CompensationFailed,
                    contributor,
                    Some(stream.recipient),
                    err.to_string(),
                );
                Termination::Degraded {
                    recipient: stream.recipient,
                    rate: stream.rate,
                }
            }
        }
    }

    /// Drive the outbound stream to `recipient` to exactly `target`.
    fn apply_outbound(&mut self, recipient: Address, target: FlowRate) -> RouterResult<()> {
        if target.is_negative() {
            return Err(RouterError::InvariantViolation(format!(
                "negative outbound rate {target} to {recipient}"
            )));
        }
        if !target.is_representable() {
            return Err(RouterError::RateOverflow { recipient });
        }

        let current = self.host.flow_rate(self.address, recipient);
        if current == target {
            return Ok(());
        }
        if current.is_zero() {
            self.host.create_flow(self.address, recipient, target)?;
        } else if target.is_zero() {
            self.host.delete_flow(self.address, recipient)?;
        } else {
            self.host.update_flow(self.address, recipient, target)?;
        }

        let observed = self.host.flow_rate(self.address, recipient);
        if observed != target {
            return Err(RouterError::InvariantViolation(format!(
                "outbound to {recipient} is {observed} after setting {target}"
            )));
        }
        metrics::record_outbound(recipient, target);
        tracing::debug!(%recipient, from = %current, to = %target, "Outbound stream adjusted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn net_router_flow(&self) -> FlowRate {
        self.host.net_flow(self.address)
    }

    pub fn flow_to_recipient(&self, recipient: &Address) -> FlowRate {
        self.host.flow_rate(self.address, *recipient)
    }

    pub fn is_registered(&self, recipient: &Address) -> bool {
        self.registry.is_registered(recipient)
    }

    /// Settled plus accruing contributions to `recipient` right now.
    pub fn total_contributed(&self, recipient: &Address) -> U256 {
        self.accumulator.total_at(recipient, self.clock.now())
    }

    pub fn contributors_for(&self, recipient: &Address) -> BTreeSet<Address> {
        self.accumulator.contributors_for(recipient)
    }

    /// Compare every recipient's outbound flow with its ledger total.
    pub fn check_invariants(&self) -> RouterResult<()> {
        let expected_by_recipient = self.ledger.by_recipient();
        if let Some(stray) = expected_by_recipient
            .keys()
            .find(|r| !self.registry.is_registered(r))
        {
            return Err(RouterError::InvariantViolation(format!(
                "ledger routes to unregistered {stray}"
            )));
        }

        let mut outbound_total = FlowRate::ZERO;
        for recipient in self.registry.iter().map(|r| r.address) {
            let expected = expected_by_recipient
                .get(&recipient)
                .copied()
                .unwrap_or_default();
            let actual = self.host.flow_rate(self.address, recipient);
            if expected != actual {
                return Err(RouterError::InvariantViolation(format!(
                    "outbound to {recipient} is {actual}, ledger holds {expected}"
                )));
            }
            outbound_total = FlowRate::new(outbound_total.get() + actual.get());
        }
        let inbound_total = self.ledger.total_inbound();
        if inbound_total != outbound_total {
            return Err(RouterError::InvariantViolation(format!(
                "inbound {inbound_total} != outbound {outbound_total}"
            )));
        }
        Ok(())
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn registry(&self) -> &RecipientRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &StreamLedger {
        &self.ledger
    }

    pub fn accumulator(&self) -> &ContributionAccumulator {
        &self.accumulator
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn ensure_owner(&self, caller: Address) -> RouterResult<()> {
        if caller != self.owner {
            return Err(RouterError::Unauthorized { caller });
        }
        Ok(())
    }

    fn ensure_token(&self, token: Address) -> RouterResult<()> {
        if token != self.token {
            return Err(RouterError::UnsupportedToken(token));
        }
        Ok(())
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn finish(&mut self, event: &'static str, contributor: Address, result: &RouterResult<()>) {
        match result {
            Ok(()) => {
                metrics::record_event(event, "ack");
                self.audit(contributor);
            }
            Err(err) => {
                tracing::warn!(event, %contributor, error = %err, "Lifecycle event rejected");
                metrics::record_event(event, err.kind());
            }
        }
        metrics::record_active_streams(self.ledger.len());
    }

    /// Record drift once when it appears; clear it once it heals.
    fn audit(&mut self, contributor: Address) {
        match self.check_invariants() {
            Ok(()) => {
                if self.drift.take().is_some() {
                    tracing::info!("Outbound flows reconciled with ledger");
                }
            }
            Err(err) => {
                let detail = err.to_string();
                if self.drift.as_deref() != Some(detail.as_str()) {
                    self.record_anomaly(AnomalyKind::InvariantDrift, contributor, None, detail.clone());
                    self.drift = Some(detail);
                }
            }
        }
    }

    fn record_anomaly(
        &mut self,
        kind: AnomalyKind,
        contributor: Address,
        recipient: Option<Address>,
        detail: String,
    ) {
        tracing::warn!(
            kind = kind.as_str(),
            %contributor,
            recipient = ?recipient,
            detail = %detail,
            "Router anomaly"
        );
        metrics::record_anomaly(kind.as_str());
        self.anomalies.push(Anomaly {
            sequence: self.sequence,
            at: self.clock.now(),
            kind,
            contributor,
            recipient,
            detail,
        });
        trim_oldest(&mut self.anomalies);
    }
}

/// Keep only the newest `MAX_ANOMALIES` records.
fn trim_oldest(anomalies: &mut Vec<Anomaly>) {
    let excess = anomalies.len().saturating_sub(MAX_ANOMALIES);
    if excess > 0 {
        anomalies.drain(..excess);
    }
}

fn ensure_rate(rate: FlowRate) -> RouterResult<()> {
    if rate.is_positive() && rate.is_representable() {
        Ok(())
    } else {
        Err(RouterError::InvalidFlowRate(rate))
    }
}
