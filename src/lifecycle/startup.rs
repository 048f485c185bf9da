//! Startup orchestration.
//!
//! # Responsibilities
//! - Seed the store from the persisted snapshot
//! - Assemble subsystems in dependency order
//! - Hand the caller a runnable [`Service`]
//!
//! # Design Decisions
//! - Fail fast: any assembly error is fatal
//! - The listener is bound by the caller and passed in last, so traffic
//!   only flows once everything else is ready
//! - No ambient globals: every subsystem is an explicit value shared
//!   through the application state

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::server::{build_route_table, AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::PhaseCell;
use crate::persist::{load_snapshot, SnapshotPersister};
use crate::routing::RouteError;
use crate::stats::StatsCollector;
use crate::store::HashStore;
use crate::worker::{pipeline, PipelineError, PipelineOptions, PipelineRunner};

/// Error running the assembled service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("route table: {0}")]
    Routes(#[from] RouteError),
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker pipeline: {0}")]
    Pipeline(#[from] PipelineError),
}

/// A fully assembled, not yet running service.
pub struct Service {
    state: AppState,
    server: HttpServer,
    runner: PipelineRunner,
    shutdown: Shutdown,
}

impl Service {
    /// Build every subsystem from the configuration.
    ///
    /// Order: snapshot → store → persister → stats → pipeline → routes →
    /// server.
    pub fn assemble(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let snapshot = load_snapshot(&config.persistence.snapshot_path);
        let store = Arc::new(HashStore::from_snapshot(snapshot));
        let persister = Arc::new(SnapshotPersister::new(&config.persistence.snapshot_path));
        let stats = Arc::new(StatsCollector::new());
        let phase = Arc::new(PhaseCell::new());
        let shutdown = Shutdown::new();

        let (pipeline_handle, runner) = pipeline(
            store.clone(),
            persister,
            shutdown.clone(),
            PipelineOptions {
                hash_delay: std::time::Duration::from_millis(config.worker.hash_delay_ms),
                wait_on_drain: config.worker.wait_on_drain,
                drain_grace: std::time::Duration::from_secs(config.timeouts.drain_grace_secs),
            },
        );

        let state = AppState {
            store,
            stats,
            pipeline: pipeline_handle,
            phase,
            shutdown: shutdown.clone(),
            routes: Arc::new(build_route_table()?),
        };

        let server = HttpServer::new(config, state.clone());

        Ok(Self {
            state,
            server,
            runner,
            shutdown,
        })
    }

    /// Handle for triggering or observing shutdown from outside.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// The shared application state (used by tests and diagnostics).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run to completion: serve, drain, then settle the worker pipeline.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServiceError> {
        let pipeline_task = tokio::spawn(self.runner.run());

        let serve_result = self.server.run(listener, self.shutdown.clone()).await;

        // If the server stopped without a shutdown trigger (listener
        // error), the pipeline still needs one to settle.
        self.shutdown.trigger();

        let pipeline_result = match pipeline_task.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(error = %join_err, "Pipeline task failed");
                Ok(())
            }
        };

        serve_result?;
        pipeline_result?;
        Ok(())
    }
}
