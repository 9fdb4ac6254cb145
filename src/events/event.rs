//! Runtime events emitted by workers, writers, the transaction controller,
//! and the orchestrator.
//!
//! [`EventKind`] classifies events across the subsystems; [`Event`] carries
//! optional metadata (unit id, reason, attempt, phases) set builder-style.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Subscribers can use `seq` to restore a total order when
//! events arrive interleaved from several queues.
//!
//! ## Severity
//! Severity is derived from the kind via [`Event::severity`]; the runtime
//! favors silence over fabrication for missing data (acquisition misses log
//! at debug), and loud failure for everything else (errors and critical
//! conditions always become events).

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::unit::{Phase, UnitId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Worker lifecycle ===
    /// A worker task was spawned for its unit.
    WorkerStarted,
    /// A worker exited cleanly (shutdown or drain complete).
    WorkerStopped,
    /// A worker crashed or was hard-killed after hanging.
    WorkerCrashed,
    /// A crashed worker will be respawned after the cooldown.
    WorkerRestartScheduled,
    /// A worker exhausted its restart budget and will not be retried.
    WorkerDead,

    // === Acquisition cycle ===
    /// The unit's derived phase changed between two cycles.
    PhaseChanged,
    /// A cycle transitioned into `Ended`; a cycle record was appended.
    CycleCompleted,
    /// Three consecutive acquisition misses for one unit.
    AcquireMissStreak,

    // === Batch persistence ===
    /// A flush exhausted its retries; the buffer was retained.
    FlushFailed,
    /// The retained buffer exceeded its ceiling; oldest records dropped.
    RecordsDropped,

    // === Transactions ===
    /// All steps of a transaction applied successfully.
    TxnCompleted,
    /// A step failed or timed out; prior steps were rolled back.
    TxnFailed,

    // === Behavior agents ===
    /// An agent became the active agent for its unit.
    AgentActivated,
    /// The active agent finished or failed; the prior agent was restored.
    AgentFinished,

    // === Shutdown ===
    /// Shutdown was requested (signal or `stop_all`).
    ShutdownRequested,
    /// All workers stopped within the grace period.
    AllStoppedWithin,
    /// Grace period exceeded; remaining workers were aborted.
    GraceExceeded,
}

/// Coarse severity derived from an event's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - remaining fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Unit the event concerns, if any (`None` for global events).
    pub unit: Option<UnitId>,
    /// Human-readable reason (errors, drop details, agent names).
    pub reason: Option<Arc<str>>,
    /// Attempt or streak count, where applicable.
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds (restarts, retries).
    pub delay_ms: Option<u32>,
    /// Phase transition `(from, to)` for [`EventKind::PhaseChanged`].
    pub phases: Option<(Phase, Phase)>,
    /// Item count (e.g. records dropped at the memory ceiling).
    pub count: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            phases: None,
            count: None,
        }
    }

    /// Attaches the unit the event concerns.
    #[inline]
    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt or streak count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a phase transition.
    #[inline]
    pub fn with_phases(mut self, from: Phase, to: Phase) -> Self {
        self.phases = Some((from, to));
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Severity implied by this event's kind.
    pub fn severity(&self) -> Severity {
        match self.kind {
            EventKind::AcquireMissStreak => Severity::Warning,
            EventKind::WorkerCrashed | EventKind::FlushFailed | EventKind::TxnFailed => {
                Severity::Error
            }
            EventKind::WorkerDead | EventKind::RecordsDropped | EventKind::GraceExceeded => {
                Severity::Critical
            }
            _ => Severity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::WorkerStarted);
        let b = Event::new(EventKind::WorkerStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn severity_mapping() {
        assert_eq!(
            Event::new(EventKind::AcquireMissStreak).severity(),
            Severity::Warning
        );
        assert_eq!(Event::new(EventKind::FlushFailed).severity(), Severity::Error);
        assert_eq!(
            Event::new(EventKind::RecordsDropped).severity(),
            Severity::Critical
        );
        assert_eq!(Event::new(EventKind::WorkerDead).severity(), Severity::Critical);
        assert_eq!(Event::new(EventKind::PhaseChanged).severity(), Severity::Info);
    }
}
