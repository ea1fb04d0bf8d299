//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router engine and HTTP layer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (event counters, anomaly counters, flow gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into handler spans
//! - Metric updates are no-ops until a recorder is installed, so the engine
//!   can be driven from tests without any setup

pub mod logging;
pub mod metrics;
