//! Runtime configuration.
//!
//! [`OrchestratorConfig`] centralizes supervision settings (heartbeat
//! polling, restart budget, shutdown grace); [`WorkerConfig`] describes one
//! unit's immutable acquisition setup.
//!
//! Every knob is an explicit value with a documented default; there are no
//! `0 = unlimited` sentinels in the supervision path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::unit::UnitId;

/// Opaque acquisition region descriptor.
///
/// The core never interprets these; they are carried to the acquisition
/// collaborator verbatim (screen coordinates, sensor addresses, template
/// ids — whatever the backend needs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Region name, unique within one worker.
    pub name: String,
    /// Backend-specific descriptor.
    pub descriptor: serde_json::Value,
}

impl RegionSpec {
    /// Creates a region descriptor.
    pub fn new(name: impl Into<String>, descriptor: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// Immutable per-worker configuration.
///
/// Fixed at registration time; the worker and its agents only ever read it.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Unit this worker tracks.
    pub unit: UnitId,
    /// Unique numeric index, used for deterministic start staggering.
    pub index: u32,
    /// Ordered acquisition region descriptors (opaque to the core).
    pub regions: Vec<RegionSpec>,
    /// Upper bound on one acquisition call.
    pub acquire_timeout: Duration,
}

impl WorkerConfig {
    /// Creates a worker configuration with the default acquisition timeout (10s).
    pub fn new(unit: impl Into<UnitId>, index: u32) -> Self {
        Self {
            unit: unit.into(),
            index,
            regions: Vec::new(),
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Adds a region descriptor (builder style).
    pub fn with_region(mut self, region: RegionSpec) -> Self {
        self.regions.push(region);
        self
    }

    /// Overrides the acquisition timeout (builder style).
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Global configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Heartbeat polling interval of the monitor loop.
    pub poll_interval: Duration,
    /// Consecutive stale polls after which a worker counts as hung.
    pub missed_limit: u32,
    /// Crash budget: a worker that crashes `max_restarts` times is marked
    /// dead and never respawned. (Crashes 1..max_restarts-1 are restarted.)
    pub max_restarts: u32,
    /// Cooldown between a crash and the respawn.
    pub cooldown: Duration,
    /// Maximum wait for graceful shutdown before aborting workers.
    pub grace: Duration,
    /// Wait after cancelling a hung worker before hard-aborting it.
    pub kill_timeout: Duration,
    /// Per-index start offset so workers do not acquire in lock-step.
    pub stagger: Duration,
}

impl Default for OrchestratorConfig {
    /// Provides a default configuration:
    /// - `poll_interval = 10s`
    /// - `missed_limit = 3`
    /// - `max_restarts = 3`
    /// - `cooldown = 2s`
    /// - `grace = 30s`
    /// - `kill_timeout = 5s`
    /// - `stagger = 250ms`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            missed_limit: 3,
            max_restarts: 3,
            cooldown: Duration::from_secs(2),
            grace: Duration::from_secs(30),
            kill_timeout: Duration::from_secs(5),
            stagger: Duration::from_millis(250),
        }
    }
}
