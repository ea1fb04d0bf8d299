//! Router error taxonomy.

use alloy::primitives::Address;
use thiserror::Error;

use crate::router::metadata::MalformedReason;
use crate::streaming::types::{FlowRate, HostError};

/// Why a routing target was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipientFault {
    /// No routing metadata was supplied.
    #[error("no recipient in stream metadata")]
    Missing,

    /// Metadata could not be decoded as an address.
    #[error("malformed metadata: {0}")]
    Malformed(MalformedReason),

    /// Decoded address is not a registered recipient.
    #[error("{0} is not a registered recipient")]
    Unregistered(Address),

    /// The router's own address, which it cannot stream to.
    #[error("the router cannot route to itself")]
    SelfRoute,
}

/// Errors surfaced by the routing engine.
///
/// Creation and update callbacks return these as rejections; the host then
/// rolls back the contributor's stream action. Termination never returns one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// Admin call from someone other than the owner.
    #[error("caller {caller} is not the router owner")]
    Unauthorized { caller: Address },

    #[error("recipient {0} is already registered")]
    AlreadyRegistered(Address),

    #[error("distribution index is already initialized")]
    AlreadyInitialized,

    #[error("distribution index has not been initialized")]
    DistributionNotInitialized,

    #[error("invalid recipient: {0}")]
    InvalidRecipient(RecipientFault),

    /// A recipient switch could not apply both of its legs.
    #[error("switch from {from} to {to} failed: {reason}")]
    PartialRouteFailure {
        from: Address,
        to: Address,
        reason: String,
    },

    /// Update or delete for a contributor with no ledger entry.
    #[error("no stream from {0} is routed through this router")]
    UnknownStream(Address),

    /// Creation for a contributor that already streams to the router.
    #[error("a stream from {0} is already routed")]
    StreamExists(Address),

    #[error("token {0} is not the router's configured token")]
    UnsupportedToken(Address),

    #[error("invalid flow rate {0}")]
    InvalidFlowRate(FlowRate),

    /// The aggregate outbound rate would leave the int96 range.
    #[error("outbound rate to {recipient} would overflow")]
    RateOverflow { recipient: Address },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("host refused compensating action: {0}")]
    Host(#[from] HostError),
}

impl RouterError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::Unauthorized { .. } => "unauthorized",
            RouterError::AlreadyRegistered(_) => "already_registered",
            RouterError::AlreadyInitialized => "already_initialized",
            RouterError::DistributionNotInitialized => "distribution_not_initialized",
            RouterError::InvalidRecipient(_) => "invalid_recipient",
            RouterError::PartialRouteFailure { .. } => "partial_route_failure",
            RouterError::UnknownStream(_) => "unknown_stream",
            RouterError::StreamExists(_) => "stream_exists",
            RouterError::UnsupportedToken(_) => "unsupported_token",
            RouterError::InvalidFlowRate(_) => "invalid_flow_rate",
            RouterError::RateOverflow { .. } => "rate_overflow",
            RouterError::InvariantViolation(_) => "invariant_violation",
            RouterError::Host(_) => "host",
        }
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::InvalidRecipient(RecipientFault::Unregistered(Address::ZERO));
        assert!(err.to_string().contains("not a registered recipient"));

        let err = RouterError::InvalidRecipient(RecipientFault::Malformed(MalformedReason::Length(3)));
        assert!(err.to_string().contains("malformed"));

        let err = RouterError::PartialRouteFailure {
            from: Address::with_last_byte(1),
            to: Address::with_last_byte(2),
            reason: "receiver refuses incoming flows".into(),
        };
        assert!(err.to_string().contains("refuses"));
    }

    #[test]
    fn test_host_error_conversion() {
        let err: RouterError = HostError::InvalidRate(FlowRate::ZERO).into();
        assert_eq!(err.kind(), "host");
    }
}
