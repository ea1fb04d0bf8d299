//! Flow-rate and host error definitions.

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest rate a host flow can carry (signed 96-bit).
pub const MAX_FLOW_RATE: i128 = (1i128 << 95) - 1;

/// Smallest rate a host flow can carry (signed 96-bit).
pub const MIN_FLOW_RATE: i128 = -(1i128 << 95);

/// Token units streamed per second.
///
/// Host flows are signed 96-bit quantities. The wrapper stores an `i128` so
/// that aggregates such as net flow can be computed without overflow; only
/// values inside the int96 range are accepted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FlowRate(i128);

impl FlowRate {
    pub const ZERO: FlowRate = FlowRate(0);

    pub const fn new(raw: i128) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i128 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether the host can carry this rate on a single flow.
    pub const fn is_representable(self) -> bool {
        self.0 >= MIN_FLOW_RATE && self.0 <= MAX_FLOW_RATE
    }

    /// Addition that fails outside the int96 range.
    pub fn checked_add(self, other: FlowRate) -> Option<FlowRate> {
        self.0
            .checked_add(other.0)
            .map(FlowRate)
            .filter(|r| r.is_representable())
    }

    /// Subtraction that fails outside the int96 range.
    pub fn checked_sub(self, other: FlowRate) -> Option<FlowRate> {
        self.0
            .checked_sub(other.0)
            .map(FlowRate)
            .filter(|r| r.is_representable())
    }
}

impl From<i64> for FlowRate {
    fn from(raw: i64) -> Self {
        Self(raw as i128)
    }
}

impl std::iter::Sum for FlowRate {
    fn sum<I: Iterator<Item = FlowRate>>(iter: I) -> Self {
        FlowRate(iter.map(|r| r.0).sum())
    }
}

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FlowRate {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i128>().map(FlowRate)
    }
}

// Rates travel as decimal strings, matching how streaming SDKs expose them.
impl Serialize for FlowRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

// Integers are accepted too, for hand-written requests.
impl<'de> Deserialize<'de> for FlowRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RateVisitor;

        impl serde::de::Visitor<'_> for RateVisitor {
            type Value = FlowRate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer flow rate or its decimal string")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<FlowRate, E> {
                Ok(FlowRate(v as i128))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<FlowRate, E> {
                Ok(FlowRate(v as i128))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<FlowRate, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(RateVisitor)
    }
}

/// A single open flow, as persisted for an in-process host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFlow {
    pub sender: Address,
    pub receiver: Address,
    pub rate: FlowRate,
}

/// Errors returned by a streaming host when a flow operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A flow between the pair is already open.
    #[error("flow {sender} -> {receiver} already exists")]
    FlowExists { sender: Address, receiver: Address },

    /// No flow between the pair.
    #[error("flow {sender} -> {receiver} does not exist")]
    FlowNotFound { sender: Address, receiver: Address },

    /// Rate is zero, negative or outside the int96 range.
    #[error("invalid flow rate {0}")]
    InvalidRate(FlowRate),

    /// Sender and receiver are the same account.
    #[error("account {0} cannot stream to itself")]
    SelfFlow(Address),

    /// The receiver refuses incoming flows.
    #[error("receiver {0} refuses incoming flows")]
    ReceiverRejected(Address),
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
