//! In-memory digest store.
//!
//! # Responsibilities
//! - Allocate monotonically increasing identifiers
//! - Hold the identifier → digest mapping
//! - Produce consistent snapshots for persistence and reporting
//!
//! # Design Decisions
//! - Identifier allocation is a single atomic fetch-add, no lock
//! - Readers share the map lock; writers are exclusive
//! - Absence of a digest is a valid state, not an error

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Thread-safe store mapping identifiers to computed digests.
///
/// Identifiers returned by [`HashStore::allocate`] are strictly increasing
/// and never reused within a process lifetime. A value is present only once
/// the worker pipeline has completed the corresponding computation.
pub struct HashStore {
    entries: RwLock<HashMap<u64, String>>,
    counter: AtomicU64,
}

impl HashStore {
    /// Create an empty store with the counter at zero.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Create a store seeded from a persisted snapshot.
    ///
    /// The counter resumes at the maximum persisted identifier so that
    /// identifiers are never reused across restarts of the same snapshot.
    pub fn from_snapshot(entries: HashMap<u64, String>) -> Self {
        let max_id = entries.keys().copied().max().unwrap_or(0);
        Self {
            entries: RwLock::new(entries),
            counter: AtomicU64::new(max_id),
        }
    }

    /// Atomically allocate the next identifier.
    pub fn allocate(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current value of the identifier counter.
    pub fn current_identifier(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Look up a digest. `None` means unknown or not yet computed.
    pub fn get(&self, id: u64) -> Option<String> {
        let entries = self.entries.read().expect("store lock poisoned");
        entries.get(&id).cloned()
    }

    /// Store a digest. Overwrites any previous value for the identifier.
    pub fn set(&self, id: u64, value: String) {
        let mut entries = self.entries.write().expect("store lock poisoned");
        entries.insert(id, value);
    }

    /// Consistent point-in-time copy of the whole mapping.
    pub fn snapshot(&self) -> HashMap<u64, String> {
        let entries = self.entries.read().expect("store lock poisoned");
        entries.clone()
    }
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new()
    }
}
