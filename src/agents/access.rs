//! Read-only access to a worker's local state.
//!
//! Agents, planners, and any other in-process observer reach unit state
//! exclusively through [`StateAccess`] — a small interface returning owned
//! clones. Nothing behind it can mutate the worker's view, which is what
//! keeps "at most one writer per unit" a structural property rather than a
//! convention.

use std::sync::{Arc, RwLock};

use crate::unit::{BoundedHistory, CycleRecord, StateSnapshot};

/// Read-only view of one unit's local state.
pub trait StateAccess: Send + Sync {
    /// The most recently acquired snapshot.
    fn snapshot(&self) -> StateSnapshot;

    /// The completed-cycle history, oldest first.
    fn history(&self) -> Vec<CycleRecord>;
}

/// Owner side of a unit's local state.
///
/// The worker holds the only `Arc<StateCell>` used for writing; everyone
/// else receives it upcast to `Arc<dyn StateAccess>`. Reads take brief
/// `RwLock` read guards and clone out, so readers can never observe a
/// half-updated cycle.
pub struct StateCell {
    snapshot: RwLock<StateSnapshot>,
    history: RwLock<BoundedHistory>,
}

impl StateCell {
    /// Creates a cell with an `Unknown` snapshot and the given history capacity.
    pub fn new(history_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            snapshot: RwLock::new(StateSnapshot::default()),
            history: RwLock::new(BoundedHistory::new(history_capacity)),
        })
    }

    /// Replaces the snapshot (worker only, once per cycle).
    pub fn set_snapshot(&self, snapshot: StateSnapshot) {
        if let Ok(mut guard) = self.snapshot.write() {
            *guard = snapshot;
        }
    }

    /// Appends a completed cycle (worker only, on transition into `Ended`).
    pub fn push_cycle(&self, record: CycleRecord) {
        if let Ok(mut guard) = self.history.write() {
            guard.push(record);
        }
    }

    /// Number of retained completed cycles.
    pub fn history_len(&self) -> usize {
        self.history.read().map(|h| h.len()).unwrap_or(0)
    }
}

impl StateAccess for StateCell {
    fn snapshot(&self) -> StateSnapshot {
        self.snapshot
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn history(&self) -> Vec<CycleRecord> {
        self.history.read().map(|h| h.to_vec()).unwrap_or_default()
    }
}
