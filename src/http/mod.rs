//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → auth.rs (bearer key, caller address)
//!     → handlers.rs (host callbacks, admin, queries)
//!     → response.rs (error → status code)
//!     → Send to client
//! ```

pub mod auth;
pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
