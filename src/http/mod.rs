//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware stack, drain control)
//!     → request.rs (assign/echo X-Request-Id)
//!     → stats middleware (duration + status aggregation)
//!     → route table dispatch
//!     → handlers.rs (health, submit, fetch, shutdown, stats)
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
