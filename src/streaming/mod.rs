//! Money-streaming host abstraction.
//!
//! # Data Flow
//! ```text
//! contributor action
//!     → driver.rs (host applies the inbound flow)
//!     → router callback (engine adjusts outbound flows via host.rs)
//!     → memory.rs (in-process host state)
//! ```

pub mod driver;
pub mod host;
pub mod memory;
pub mod types;

pub use driver::HostDriver;
pub use host::StreamHost;
pub use memory::MemoryHost;
pub use types::{FlowRate, HostError, HostFlow};
