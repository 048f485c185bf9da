//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT, SIGQUIT and SIGTERM
//! - Translate the first received signal into a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's async-safe signal handling
//! - Signals and the /shutdown endpoint share one coordinator path

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Spawn the background task that forwards termination signals to the
/// shutdown coordinator.
pub fn spawn_listener(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        tracing::info!("Termination signal received");
        shutdown.trigger();
    })
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = quit.recv() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
