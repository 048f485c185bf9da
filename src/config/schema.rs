//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! service. All types derive Serde traits for deserialization from config
//! files, with defaults matching the reference deployment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the hashing service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Worker pipeline configuration.
    pub worker: WorkerConfig,

    /// Snapshot persistence configuration.
    pub persistence: PersistenceConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request ceiling, seconds.
    pub request_secs: u64,

    /// Bounded grace period for draining connections, seconds.
    pub drain_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 10,
            drain_grace_secs: 30,
        }
    }
}

/// Worker pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Deliberate delay before each digest computation, milliseconds.
    pub hash_delay_ms: u64,

    /// Whether draining awaits in-flight jobs (`true`) or abandons them
    /// (`false`, the reference behavior).
    pub wait_on_drain: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            hash_delay_ms: 5_000,
            wait_on_drain: false,
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// File holding the serialized identifier → digest mapping.
    pub snapshot_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./hashd-snapshot.json"),
        }
    }
}
