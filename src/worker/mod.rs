//! Deferred hashing pipeline.
//!
//! # Data Flow
//! ```text
//! POST /hash handler
//!     → handle.submit(id, secret)       (returns immediately)
//!     → runner spawns one task per job:
//!         sleep(configured delay)
//!         digest = base64(SHA-512(secret))
//!         store.set(id, digest)
//!         persist full store snapshot
//! ```
//!
//! # Design Decisions
//! - The artificial delay is deliberate (simulates a slow workload) and
//!   lives on the job's own task, never the request thread
//! - Per identifier, set happens before the persist attempt that includes
//!   it; there is no cross-identifier completion order
//! - Persistence failure is fail-stop: logged, shutdown triggered, and the
//!   runner returns the error so the process exits non-zero
//! - Drain policy is configurable: await in-flight jobs (time-boxed by the
//!   drain grace period) or abandon them

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha512};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::lifecycle::shutdown::Shutdown;
use crate::persist::{PersistError, SnapshotPersister};
use crate::store::HashStore;

/// Compute the one-way transformation: base64 of the SHA-512 digest.
pub fn compute_digest(secret: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(secret.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// A scheduled hashing job.
#[derive(Debug)]
pub struct HashJob {
    pub id: u64,
    pub secret: String,
}

/// Error submitting a job to the pipeline.
#[derive(Debug, Error)]
#[error("pipeline is no longer accepting jobs")]
pub struct SubmitError;

/// Fatal pipeline failure.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("snapshot persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Cheap handle used by request handlers to enqueue work.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<HashJob>,
}

impl PipelineHandle {
    /// Schedule background work for an allocated identifier.
    ///
    /// Never blocks; the computation and persistence happen on the
    /// runner's tasks.
    pub fn submit(&self, id: u64, secret: String) -> Result<(), SubmitError> {
        self.tx.send(HashJob { id, secret }).map_err(|_| SubmitError)
    }
}

/// Pipeline tuning taken from the worker section of the config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Artificial delay before each computation.
    pub hash_delay: Duration,
    /// Await in-flight jobs during drain instead of abandoning them.
    pub wait_on_drain: bool,
    /// Ceiling on how long a drain may wait for in-flight jobs.
    pub drain_grace: Duration,
}

/// Owns the job queue and runs jobs to completion.
pub struct PipelineRunner {
    rx: mpsc::UnboundedReceiver<HashJob>,
    store: Arc<HashStore>,
    persister: Arc<SnapshotPersister>,
    shutdown: Shutdown,
    options: PipelineOptions,
}

/// Build a connected handle/runner pair.
pub fn pipeline(
    store: Arc<HashStore>,
    persister: Arc<SnapshotPersister>,
    shutdown: Shutdown,
    options: PipelineOptions,
) -> (PipelineHandle, PipelineRunner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PipelineHandle { tx },
        PipelineRunner {
            rx,
            store,
            persister,
            shutdown,
            options,
        },
    )
}

impl PipelineRunner {
    /// Process jobs until shutdown, then drain per the configured policy.
    pub async fn run(mut self) -> Result<(), PipelineError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut jobs: JoinSet<Result<u64, PersistError>> = JoinSet::new();

        enum Event {
            Job(Option<HashJob>),
            Finished(Result<Result<u64, PersistError>, tokio::task::JoinError>),
            Drain,
        }

        let fatal = loop {
            let event = tokio::select! {
                maybe_job = self.rx.recv() => Event::Job(maybe_job),
                Some(finished) = jobs.join_next(), if !jobs.is_empty() => Event::Finished(finished),
                _ = shutdown_rx.recv() => Event::Drain,
            };

            match event {
                Event::Job(Some(job)) => self.spawn_job(&mut jobs, job),
                // All handles dropped: nothing more will arrive.
                Event::Job(None) => break None,
                Event::Finished(finished) => {
                    if let Some(err) = Self::note_completion(finished) {
                        break Some(err);
                    }
                }
                Event::Drain => break None,
            }
        };

        if let Some(err) = fatal {
            // Reference behavior: a failed persist is fatal to the process.
            // We stop the whole service in order instead of exiting abruptly.
            tracing::error!(error = %err, "Snapshot persistence failed, stopping service");
            self.shutdown.trigger();
            return Err(PipelineError::Persist(err));
        }

        self.drain(jobs).await
    }

    fn spawn_job(&self, jobs: &mut JoinSet<Result<u64, PersistError>>, job: HashJob) {
        let store = self.store.clone();
        let persister = self.persister.clone();
        let delay = self.options.hash_delay;

        tracing::debug!(id = job.id, "Job scheduled");
        jobs.spawn(async move {
            tokio::time::sleep(delay).await;

            let digest = compute_digest(&job.secret);
            store.set(job.id, digest);

            // The snapshot taken here necessarily contains this job's set.
            persister.persist(&store.snapshot()).await?;
            Ok(job.id)
        });
    }

    /// Record one finished job; returns the error if it was fatal.
    fn note_completion(
        finished: Result<Result<u64, PersistError>, tokio::task::JoinError>,
    ) -> Option<PersistError> {
        match finished {
            Ok(Ok(id)) => {
                tracing::debug!(id = id, "Job completed and persisted");
                None
            }
            Ok(Err(err)) => Some(err),
            Err(join_err) => {
                tracing::error!(error = %join_err, "Hash job panicked");
                None
            }
        }
    }

    async fn drain(mut self, mut jobs: JoinSet<Result<u64, PersistError>>) -> Result<(), PipelineError> {
        self.rx.close();

        if self.options.wait_on_drain {
            // Jobs accepted before the trigger but not yet picked up still
            // count as in-flight.
            while let Ok(job) = self.rx.try_recv() {
                self.spawn_job(&mut jobs, job);
            }
        }

        if !self.options.wait_on_drain {
            let abandoned = jobs.len();
            if abandoned > 0 {
                tracing::warn!(jobs = abandoned, "Abandoning in-flight hash jobs");
            }
            jobs.shutdown().await;
            return Ok(());
        }

        tracing::info!(jobs = jobs.len(), "Waiting for in-flight hash jobs");
        let wait_all = async {
            while let Some(finished) = jobs.join_next().await {
                if let Some(err) = Self::note_completion(finished) {
                    return Err(err);
                }
            }
            Ok(())
        };

        match tokio::time::timeout(self.options.drain_grace, wait_all).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Snapshot persistence failed during drain");
                Err(PipelineError::Persist(err))
            }
            Err(_) => {
                tracing::warn!(jobs = jobs.len(), "Drain grace exceeded, abandoning jobs");
                jobs.shutdown().await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("hashd-worker-{}-{}", std::process::id(), name));
        p
    }

    fn options(delay_ms: u64, wait_on_drain: bool) -> PipelineOptions {
        PipelineOptions {
            hash_delay: Duration::from_millis(delay_ms),
            wait_on_drain,
            drain_grace: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_digest_known_vector() {
        // base64 of SHA-512("test")
        assert_eq!(
            compute_digest("test"),
            "7iaw3Ur350mqGo7jwQrpkj9hiYB3Lkc/iBml1JQODbJ6wYX4oOHV+E+IvIh/1nsUNzLDBMxfqa2Ob1f1ACio/w=="
        );
    }

    #[test]
    fn test_digest_shape() {
        let digest = compute_digest("angryMonkey");
        assert_eq!(digest.len(), 88);
        let raw = BASE64.decode(&digest).unwrap();
        assert_eq!(raw.len(), 64);
        // Deterministic across calls.
        assert_eq!(digest, compute_digest("angryMonkey"));
    }

    #[tokio::test]
    async fn test_submit_computes_and_persists() {
        let path = temp_path("computes.json");
        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(&path));
        let shutdown = Shutdown::new();

        let (handle, runner) =
            pipeline(store.clone(), persister, shutdown.clone(), options(10, true));
        let runner_task = tokio::spawn(runner.run());

        let id = store.allocate();
        handle.submit(id, "test".to_string()).unwrap();

        // Job completes after the configured delay.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.get(id), Some(compute_digest("test")));

        let persisted = crate::persist::load_snapshot(&path);
        assert_eq!(persisted.get(&id), Some(&compute_digest("test")));

        shutdown.trigger();
        runner_task.await.unwrap().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_submit_returns_before_completion() {
        let path = temp_path("nonblocking.json");
        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(&path));
        let shutdown = Shutdown::new();

        let (handle, runner) =
            pipeline(store.clone(), persister, shutdown.clone(), options(200, false));
        let runner_task = tokio::spawn(runner.run());

        let id = store.allocate();
        handle.submit(id, "secret".to_string()).unwrap();

        // Result must not be visible yet: the delay decouples the write.
        assert_eq!(store.get(id), None);

        shutdown.trigger();
        runner_task.await.unwrap().unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_jobs() {
        let path = temp_path("drain-wait.json");
        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(&path));
        let shutdown = Shutdown::new();

        let (handle, runner) =
            pipeline(store.clone(), persister, shutdown.clone(), options(50, true));
        let runner_task = tokio::spawn(runner.run());

        let id = store.allocate();
        handle.submit(id, "test".to_string()).unwrap();

        // Trigger drain while the job is still sleeping.
        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown.trigger();

        runner_task.await.unwrap().unwrap();
        assert_eq!(store.get(id), Some(compute_digest("test")));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_drain_abandons_jobs_when_configured() {
        let path = temp_path("drain-abandon.json");
        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(&path));
        let shutdown = Shutdown::new();

        let (handle, runner) =
            pipeline(store.clone(), persister, shutdown.clone(), options(60_000, false));
        let runner_task = tokio::spawn(runner.run());

        let id = store.allocate();
        handle.submit(id, "test".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown.trigger();

        runner_task.await.unwrap().unwrap();
        assert_eq!(store.get(id), None, "abandoned job must not complete");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_persist_failure_is_fatal_and_triggers_shutdown() {
        // A directory path makes every snapshot write fail.
        let dir = temp_path("not-a-file");
        std::fs::create_dir_all(&dir).unwrap();

        let store = Arc::new(HashStore::new());
        let persister = Arc::new(SnapshotPersister::new(&dir));
        let shutdown = Shutdown::new();
        let mut observer = shutdown.subscribe();

        let (handle, runner) =
            pipeline(store.clone(), persister, shutdown.clone(), options(5, true));
        let runner_task = tokio::spawn(runner.run());

        let id = store.allocate();
        handle.submit(id, "test".to_string()).unwrap();

        let result = runner_task.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Persist(_))));
        observer.recv().await.unwrap();

        // The in-memory result survives even though persistence failed.
        assert_eq!(store.get(id), Some(compute_digest("test")));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::remove_file(dir.with_extension("tmp.new")).ok();
    }
}
