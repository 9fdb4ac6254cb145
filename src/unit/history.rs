//! Fixed-capacity ring buffer of completed cycles.
//!
//! One [`BoundedHistory`] per worker. The worker appends a [`CycleRecord`]
//! every time the unit's phase transitions **into** [`Phase::Ended`]; the
//! oldest entry is evicted when the buffer is full.
//!
//! ## Rules
//! - Append-only from the owning worker; readers get clones via
//!   [`BoundedHistory::to_vec`].
//! - Iteration order is oldest → newest.
//! - Capacity is fixed at construction (minimum 1, default 100).

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::{Phase, StateSnapshot, UnitId};

/// Default number of completed cycles retained per unit.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// One completed acquisition cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Unit that completed the cycle.
    pub unit: UnitId,
    /// Wall-clock time the cycle ended.
    pub ended_at: SystemTime,
    /// The final snapshot of the cycle (phase is [`Phase::Ended`]).
    pub snapshot: StateSnapshot,
}

impl CycleRecord {
    /// Builds a record from the snapshot that closed the cycle.
    pub fn from_snapshot(unit: UnitId, snapshot: StateSnapshot) -> Self {
        debug_assert_eq!(snapshot.phase, Phase::Ended);
        Self {
            unit,
            ended_at: snapshot.at,
            snapshot,
        }
    }
}

/// Ring buffer of the last N completed cycles for one unit.
#[derive(Debug)]
pub struct BoundedHistory {
    entries: VecDeque<CycleRecord>,
    capacity: usize,
}

impl BoundedHistory {
    /// Creates a history with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a completed cycle, evicting the oldest entry when full.
    pub fn push(&mut self, record: CycleRecord) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no cycle has completed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent completed cycle, if any.
    pub fn latest(&self) -> Option<&CycleRecord> {
        self.entries.back()
    }

    /// Clones the retained entries, oldest first.
    pub fn to_vec(&self) -> Vec<CycleRecord> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unit: &str, tag: u64) -> CycleRecord {
        let snapshot = StateSnapshot::new(Phase::Ended).with_value("tag", tag.into());
        CycleRecord::from_snapshot(UnitId::new(unit), snapshot)
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut history = BoundedHistory::new(3);
        for tag in 0..5 {
            history.push(record("u1", tag));
        }
        assert_eq!(history.len(), 3);

        let tags: Vec<u64> = history
            .to_vec()
            .iter()
            .map(|r| r.snapshot.value("tag").and_then(|v| v.as_u64()).unwrap())
            .collect();
        assert_eq!(tags, vec![2, 3, 4], "oldest entries must be evicted first");
    }

    #[test]
    fn latest_tracks_newest_entry() {
        let mut history = BoundedHistory::new(2);
        assert!(history.latest().is_none());

        history.push(record("u1", 7));
        history.push(record("u1", 8));
        let latest = history.latest().unwrap();
        assert_eq!(latest.snapshot.value("tag").and_then(|v| v.as_u64()), Some(8));
    }

    #[test]
    fn capacity_is_clamped_to_one() {
        let history = BoundedHistory::new(0);
        assert_eq!(history.capacity(), 1);
    }
}
