//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check router identity (non-zero accounts, owner distinct from router)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::NodeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("router.{0} must not be the zero address")]
    ZeroAddress(&'static str),

    #[error("router.owner must differ from router.address")]
    OwnerIsRouter,

    #[error("{0} must not be empty")]
    EmptyKey(&'static str),

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("matching.unit_scale must be greater than zero")]
    ZeroUnitScale,

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check a parsed config, collecting every problem.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let router = &config.router;
    for (field, address) in [
        ("owner", router.owner),
        ("address", router.address),
        ("token", router.token),
    ] {
        if address.is_zero() {
            errors.push(ValidationError::ZeroAddress(field));
        }
    }
    if !router.owner.is_zero() && router.owner == router.address {
        errors.push(ValidationError::OwnerIsRouter);
    }

    let server = &config.server;
    if server.host_api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyKey("server.host_api_key"));
    }
    if server.admin_api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyKey("server.admin_api_key"));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    check_socket_addr(&mut errors, "server.bind_address", &server.bind_address);

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.matching.unit_scale == 0 {
        errors.push(ValidationError::ZeroUnitScale);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
