//! Worker liveness primitives: heartbeats and health snapshots.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::unit::UnitId;

/// Supervision status of one worker, as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Registered but not yet started.
    Idle,
    /// Worker task is live.
    Running,
    /// Crashed; a respawn is scheduled after the cooldown.
    Restarting,
    /// Exited cleanly (drain complete or `stop_all`).
    Stopped,
    /// Crash budget exhausted; will never be respawned.
    Dead,
}

impl WorkerStatus {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Running => "running",
            WorkerStatus::Restarting => "restarting",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Dead => "dead",
        }
    }
}

/// Point-in-time health of one worker, returned by
/// [`Orchestrator::status`](super::Orchestrator::status).
#[derive(Debug, Clone)]
pub struct WorkerHealth {
    /// The unit this worker tracks.
    pub unit: UnitId,
    /// Current supervision status.
    pub status: WorkerStatus,
    /// Time since the worker last touched its heartbeat.
    pub beat_age: Duration,
    /// Consecutive monitor polls that found the heartbeat stale.
    pub stale_polls: u32,
    /// Crashes observed so far (restarts performed = crashes while alive).
    pub crashes: u32,
}

/// Lock-free heartbeat shared between a worker and the monitor.
///
/// The worker stamps it once per loop iteration; the monitor reads the age.
/// Stored as milliseconds since a fixed epoch so both sides only touch one
/// atomic.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    epoch: Instant,
    beat_ms: AtomicU64,
}

impl Heartbeat {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            epoch: Instant::now(),
            beat_ms: AtomicU64::new(0),
        })
    }

    /// Stamps the heartbeat with "now".
    pub(crate) fn beat(&self) {
        let ms = self.epoch.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        self.beat_ms.store(ms, AtomicOrdering::Release);
    }

    /// Time elapsed since the last [`beat`](Self::beat).
    pub(crate) fn age(&self) -> Duration {
        let beat = Duration::from_millis(self.beat_ms.load(AtomicOrdering::Acquire));
        self.epoch.elapsed().saturating_sub(beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_grows_until_next_beat() {
        let hb = Heartbeat::new();
        hb.beat();
        std::thread::sleep(Duration::from_millis(30));
        assert!(hb.age() >= Duration::from_millis(25));
        hb.beat();
        assert!(hb.age() < Duration::from_millis(25));
    }
}
