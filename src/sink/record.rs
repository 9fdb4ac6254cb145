//! Immutable collected records and their type tags.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

use crate::unit::{CycleRecord, UnitId};

/// Type tag routing a record to its shared batch writer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordKind(pub &'static str);

impl RecordKind {
    /// Completed-cycle records appended by every worker.
    pub const CYCLE: RecordKind = RecordKind("cycle");

    /// The tag as a string slice.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKind({})", self.0)
    }
}

/// One immutable unit of collected data.
///
/// Produced by a worker (directly or through a collector), consumed by
/// exactly one shared [`BatchWriter`](super::BatchWriter) instance — the one
/// registered for its [`RecordKind`].
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    /// Type tag selecting the destination writer.
    pub kind: RecordKind,
    /// Unit that produced the record.
    pub unit: UnitId,
    /// Wall-clock production time.
    pub at: SystemTime,
    /// Collector-defined payload.
    pub payload: serde_json::Value,
}

impl Record {
    /// Creates a record stamped now.
    pub fn new(kind: RecordKind, unit: UnitId, payload: serde_json::Value) -> Self {
        Self {
            kind,
            unit,
            at: SystemTime::now(),
            payload,
        }
    }

    /// Builds the persistence record for a completed cycle.
    pub fn from_cycle(cycle: &CycleRecord) -> Self {
        let payload = serde_json::to_value(&cycle.snapshot)
            .unwrap_or(serde_json::Value::Null);
        Self {
            kind: RecordKind::CYCLE,
            unit: cycle.unit.clone(),
            at: cycle.ended_at,
            payload,
        }
    }
}
