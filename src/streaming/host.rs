//! The streaming host seen from the router's side.
//!
//! # Responsibilities
//! - Open, modify and close constant-rate flows for one token
//! - Answer flow and net-flow queries
//!
//! # Design Decisions
//! - At most one flow per (sender, receiver) pair
//! - Zero-rate flows never persist: closing is a delete, not an update to 0
//! - The router only ever sends as its own address; contributor flows into
//!   the router are opened by the host itself (see `driver.rs`)

use alloy::primitives::Address;

use crate::streaming::types::{FlowRate, HostResult};

/// Operations the router needs from a money-streaming host.
pub trait StreamHost: Send {
    /// The single token this host streams.
    fn token(&self) -> Address;

    /// Open a new flow. Fails if the pair already has one.
    fn create_flow(&mut self, sender: Address, receiver: Address, rate: FlowRate) -> HostResult<()>;

    /// Change the rate of an existing flow.
    fn update_flow(&mut self, sender: Address, receiver: Address, rate: FlowRate) -> HostResult<()>;

    /// Close a flow, returning the rate it had.
    fn delete_flow(&mut self, sender: Address, receiver: Address) -> HostResult<FlowRate>;

    /// Current rate from `sender` to `receiver`, zero when no flow exists.
    fn flow_rate(&self, sender: Address, receiver: Address) -> FlowRate;

    /// Incoming minus outgoing rate for `account`.
    fn net_flow(&self, account: Address) -> FlowRate;
}
