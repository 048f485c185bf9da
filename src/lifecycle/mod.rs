//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load snapshot → Seed store → Assemble subsystems → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal or /shutdown request → broadcast trigger
//!     → liveness off → drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGQUIT/SIGTERM → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One phase machine: Starting → Serving → Draining → Stopped
//! - Liveness is true only while Serving; health checks stop routing
//!   traffic before the socket actually closes
//! - Drain has a bounded grace period; remaining connections are
//!   forcibly closed after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

use std::sync::atomic::{AtomicU8, Ordering};

/// Phases of the service lifecycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePhase {
    Starting = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

/// Shared, lock-free cell holding the current [`ServicePhase`].
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ServicePhase::Starting as u8))
    }

    pub fn set(&self, phase: ServicePhase) {
        self.0.store(phase as u8, Ordering::SeqCst);
        tracing::info!(phase = ?phase, "Lifecycle phase changed");
    }

    pub fn get(&self) -> ServicePhase {
        match self.0.load(Ordering::SeqCst) {
            0 => ServicePhase::Starting,
            1 => ServicePhase::Serving,
            2 => ServicePhase::Draining,
            _ => ServicePhase::Stopped,
        }
    }

    /// Liveness flag: true only while serving.
    pub fn is_alive(&self) -> bool {
        self.get() == ServicePhase::Serving
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
