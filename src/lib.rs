//! Streaming quadratic-funding router.
//!
//! Contributors open constant-rate token streams to the router with a
//! recipient encoded in the stream's metadata. The router mirrors every inbound
//! stream onto one aggregated outbound stream per recipient, keeping its own
//! net flow at zero, and accumulates lifetime contributions for matching.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod router;
pub mod streaming;

pub use config::NodeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use router::{RoutingEngine, SharedRouter};
