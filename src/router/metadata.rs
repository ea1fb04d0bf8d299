//! Decoding of routing intent from opaque stream metadata.
//!
//! Contributors attach the ABI encoding of the target recipient's address to
//! the stream: one 32-byte word, twelve zero bytes of padding followed by the
//! twenty address bytes. Decoding is pure; classifying the decoded address
//! against the registry is a separate step so both halves can be tested on
//! their own.

use alloy::primitives::Address;
use alloy::sol_types::SolValue;
use thiserror::Error;

use crate::router::error::RecipientFault;
use crate::router::registry::RecipientRegistry;

const WORD: usize = 32;

/// Why metadata failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("expected 32 bytes, got {0}")]
    Length(usize),

    #[error("address padding is not zero")]
    Padding,

    #[error("zero address")]
    ZeroAddress,
}

/// Result of decoding metadata, before any registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteIntent {
    /// Empty payload.
    Absent,
    Malformed(MalformedReason),
    Recipient(Address),
}

/// A decoded intent checked against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Registered(Address),
    Unregistered(Address),
    Malformed(MalformedReason),
    Absent,
}

impl Resolution {
    /// The registered target, or the reason there is none.
    pub fn registered(self) -> Result<Address, RecipientFault> {
        match self {
            Resolution::Registered(recipient) => Ok(recipient),
            Resolution::Unregistered(recipient) => Err(RecipientFault::Unregistered(recipient)),
            Resolution::Malformed(reason) => Err(RecipientFault::Malformed(reason)),
            Resolution::Absent => Err(RecipientFault::Missing),
        }
    }
}

/// Decode stream metadata into a routing intent.
pub fn decode_intent(metadata: &[u8]) -> RouteIntent {
    if metadata.is_empty() {
        return RouteIntent::Absent;
    }
    if metadata.len() != WORD {
        return RouteIntent::Malformed(MalformedReason::Length(metadata.len()));
    }
    let Ok(recipient) = Address::abi_decode_validate(metadata) else {
        return RouteIntent::Malformed(MalformedReason::Padding);
    };
    if recipient.is_zero() {
        return RouteIntent::Malformed(MalformedReason::ZeroAddress);
    }
    RouteIntent::Recipient(recipient)
}

/// Encode a recipient the way contributors attach it to a stream.
pub fn encode_intent(recipient: Address) -> Vec<u8> {
    recipient.abi_encode()
}

impl RouteIntent {
    pub fn resolve(self, registry: &RecipientRegistry) -> Resolution {
        match self {
            RouteIntent::Absent => Resolution::Absent,
            RouteIntent::Malformed(reason) => Resolution::Malformed(reason),
            RouteIntent::Recipient(recipient) if registry.is_registered(&recipient) => {
                Resolution::Registered(recipient)
            }
            RouteIntent::Recipient(recipient) => Resolution::Unregistered(recipient),
        }
    }
}
