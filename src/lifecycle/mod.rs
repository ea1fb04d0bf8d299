//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Restore snapshot → Build router → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Save snapshot → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then router state, then listener
//! - Snapshot is written after the server has drained, so no callback is lost

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
