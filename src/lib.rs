//! Delayed one-way hashing service library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod persist;
pub mod routing;
pub mod stats;
pub mod store;
pub mod worker;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::shutdown::Shutdown;
pub use lifecycle::startup::{Service, ServiceError};
pub use store::HashStore;
