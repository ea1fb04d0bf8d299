//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router
//! node. All types derive Serde traits for deserialization from config files.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::router::matching::MatchingKind;

/// Root configuration for a router node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Router identity and token.
    pub router: RouterConfig,

    /// HTTP listener and API keys.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Matching strategy used when refreshing the distribution.
    pub matching: MatchingConfig,
}

/// Router identity.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Account allowed to call admin operations.
    pub owner: Address,

    /// The router's own account on the streaming host.
    pub address: Address,

    /// The single token this router accepts.
    pub token: Address,

    /// Where state is persisted between runs. No persistence when unset.
    pub snapshot_path: Option<PathBuf>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Bearer token the streaming host presents on lifecycle callbacks.
    pub host_api_key: String,

    /// Bearer token for admin operations.
    pub admin_api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
            // WARNING: placeholders, replace in production.
            host_api_key: "CHANGE_ME_HOST".to_string(),
            admin_api_key: "CHANGE_ME_ADMIN".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Matching distribution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub strategy: MatchingKind,

    /// Weight per share unit.
    pub unit_scale: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: MatchingKind::Quadratic,
            unit_scale: 1,
        }
    }
}
