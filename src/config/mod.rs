//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read, parse)
//!     → schema.rs (typed structure, serde defaults)
//!     → validation (semantic checks)
//!     → consumed once at startup; immutable thereafter
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::ServiceConfig;
