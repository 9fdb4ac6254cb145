//! The most recently acquired reading of a unit's state.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::Phase;

/// Key→value snapshot of one unit reading plus its derived [`Phase`].
///
/// Produced by the acquisition collaborator, overwritten by the worker every
/// successful cycle. Behavior agents and collectors only ever see clones or
/// shared references — never a mutable handle.
///
/// Values are kept as [`serde_json::Value`] so the core stays agnostic to
/// what the backend actually reads (counters, labels, nested structures).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Derived discrete phase for this reading.
    pub phase: Phase,
    /// Acquired key→value pairs (opaque to the core).
    pub values: BTreeMap<String, serde_json::Value>,
    /// Wall-clock time the reading was taken.
    pub at: SystemTime,
}

impl StateSnapshot {
    /// Creates an empty snapshot in the given phase, stamped now.
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            values: BTreeMap::new(),
            at: SystemTime::now(),
        }
    }

    /// Adds one value (builder style).
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Looks up a value by key.
    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

impl Default for StateSnapshot {
    /// An empty `Unknown` snapshot — the worker's state before the first
    /// successful acquisition.
    fn default() -> Self {
        Self::new(Phase::Unknown)
    }
}
