//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use hashd::config::ServiceConfig;
use hashd::{Service, ServiceError, Shutdown};

/// A service instance running on an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub snapshot_path: PathBuf,
    task: Option<JoinHandle<Result<(), ServiceError>>>,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the service to settle.
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        self.shutdown.trigger();
        let task = self.task.take().expect("service already stopped");
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("service did not stop within the grace period")
            .expect("service task panicked")
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Fast test configuration: short hash delay, drain waits for jobs.
pub fn test_config(name: &str) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.worker.hash_delay_ms = 100;
    config.worker.wait_on_drain = true;
    config.timeouts.drain_grace_secs = 5;
    config.persistence.snapshot_path = std::env::temp_dir().join(format!(
        "hashd-it-{}-{}.json",
        std::process::id(),
        name
    ));
    config
}

/// Assemble and spawn a service on an ephemeral localhost port.
pub async fn start_service(config: ServiceConfig) -> TestService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let snapshot_path = config.persistence.snapshot_path.clone();

    let service = Service::assemble(&config).unwrap();
    let shutdown = service.shutdown_handle();
    let task = tokio::spawn(async move { service.run(listener).await });

    // Give the server a moment to reach the Serving phase.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestService {
        addr,
        shutdown,
        snapshot_path,
        task: Some(task),
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
