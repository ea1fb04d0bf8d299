//! Quadratic-funding stream router.
//!
//! # Data Flow
//! ```text
//! host callback (created / updated / terminated)
//!     → metadata.rs (decode recipient intent)
//!     → registry.rs (is the recipient registered?)
//!     → engine.rs (state machine, outbound adjustments)
//!     → ledger.rs (per-contributor inbound record)
//!     → accumulator.rs (lifetime contribution totals)
//! ```
//!
//! # Design Decisions
//! - Outbound targets are recomputed from the ledger, never stored
//! - One outbound flow per recipient, regardless of contributor count
//! - Termination cannot fail; problems are recorded as anomalies
//! - Matching weights are derived from the accumulator on demand

pub mod accumulator;
pub mod anomaly;
pub mod clock;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod metadata;
pub mod registry;
pub mod shared;
pub mod snapshot;

pub use engine::{RoutingEngine, Termination};
pub use error::{RecipientFault, RouterError, RouterResult};
pub use shared::SharedRouter;
pub use snapshot::RouterSnapshot;
