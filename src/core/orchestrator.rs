//! The orchestrator: spawns one worker per unit and supervises them.
//!
//! ## Architecture
//! ```text
//!  register(spec)*      start_all()
//!       │                   │
//!       ▼                   ▼
//!  ┌─ entries ─┐   spawn worker tasks ──► UnitWorker::run (one per unit)
//!  │ unit → Entry │         │
//!  └───────────┘   spawn monitor ──► poll heartbeats every poll_interval
//!                       │                 │
//!                       │        stale ≥ missed_limit ──► cancel, kill, respawn
//!                       │        join finished:
//!                       │           clean ──► Stopped
//!                       │           panic ──► crash budget:
//!                       │              crashes < max_restarts ──► Restarting
//!                       │              else ──────────────────► Dead
//!                       ▼
//!                  stop_all(graceful) ──► cancel, grace wait, final flush
//! ```
//!
//! ## Rules
//! - **Crash budget**: a worker that crashes `max_restarts` times total is
//!   marked [`WorkerStatus::Dead`] and never respawned; earlier crashes are
//!   respawned after the configured cooldown.
//! - **Hang detection**: a heartbeat stale for `missed_limit` consecutive
//!   polls means the worker is hung; it is cancelled, hard-aborted after
//!   `kill_timeout`, and then treated exactly like a crash.
//! - **Dead is loud**: marking a unit dead publishes a critical
//!   [`EventKind::WorkerDead`]; its unit is simply no longer tracked, the
//!   rest of the fleet is unaffected.
//! - **One final flush**: `stop_all` flushes every registered writer exactly
//!   once, after the workers have stopped (or been aborted).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::agents::{AgentCoordinator, StateAccess};
use crate::config::OrchestratorConfig;
use crate::error::RuntimeError;
use crate::events::{Event, EventBus, EventKind};
use crate::sink::WriterRegistry;
use crate::txn::TransactionController;
use crate::unit::UnitId;

use super::{Heartbeat, UnitWorker, WorkerHealth, WorkerSpec, WorkerStatus};

struct Entry {
    worker: Arc<UnitWorker>,
    heartbeat: Arc<Heartbeat>,
    handle: Option<JoinHandle<()>>,
    token: CancellationToken,
    status: WorkerStatus,
    stale_polls: u32,
    crashes: u32,
    restart_at: Option<Instant>,
}

/// How a finished worker task ended, from the monitor's point of view.
enum ExitOutcome {
    Clean,
    Crashed(String),
}

/// Supervises the full fleet of unit workers.
pub struct Orchestrator {
    config: OrchestratorConfig,
    bus: EventBus,
    registry: WriterRegistry,
    txns: TransactionController,
    entries: Mutex<HashMap<UnitId, Entry>>,
    root: CancellationToken,
    running: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Creates an orchestrator over shared infrastructure.
    ///
    /// The bus, writer registry, and transaction controller are owned by the
    /// caller and shared with every worker; register writers and subscribers
    /// before [`start_all`](Self::start_all).
    pub fn new(
        config: OrchestratorConfig,
        bus: EventBus,
        registry: WriterRegistry,
        txns: TransactionController,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            bus,
            registry,
            txns,
            entries: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
            running: AtomicBool::new(false),
            monitor: Mutex::new(None),
        })
    }

    /// The shared event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The shared writer registry.
    pub fn registry(&self) -> &WriterRegistry {
        &self.registry
    }

    /// The shared transaction controller.
    pub fn txns(&self) -> &TransactionController {
        &self.txns
    }

    /// Registers a worker for a new unit.
    ///
    /// Fails on duplicate unit ids and on interval policies that violate the
    /// adaptive-cadence contract. Registration after `start_all` is allowed
    /// but the worker only runs after the next `start_all`.
    pub fn register(&self, spec: WorkerSpec) -> Result<(), RuntimeError> {
        let unit = spec.config.unit.clone();
        if let Err(detail) = spec.intervals.validate() {
            return Err(RuntimeError::InvalidIntervals {
                unit: unit.to_string(),
                detail,
            });
        }

        let mut entries = lock(&self.entries);
        if entries.contains_key(&unit) {
            return Err(RuntimeError::DuplicateUnit {
                unit: unit.to_string(),
            });
        }

        let worker = UnitWorker::new(
            spec,
            self.bus.clone(),
            self.registry.clone(),
            self.txns.clone(),
            self.config.stagger,
            self.config.poll_interval,
        );
        let heartbeat = worker.heartbeat();
        entries.insert(
            unit,
            Entry {
                worker,
                heartbeat,
                handle: None,
                token: self.root.child_token(),
                status: WorkerStatus::Idle,
                stale_polls: 0,
                crashes: 0,
                restart_at: None,
            },
        );
        Ok(())
    }

    /// Spawns every idle worker plus the heartbeat monitor.
    pub fn start_all(self: &Arc<Self>) -> Result<(), RuntimeError> {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }

        self.registry.start_tickers(&self.root);
        {
            let mut entries = lock(&self.entries);
            for entry in entries.values_mut() {
                if entry.status == WorkerStatus::Idle {
                    spawn_worker(&self.root, entry);
                }
            }
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.monitor_loop().await });
        *lock(&self.monitor) = Some(handle);
        Ok(())
    }

    /// Starts the fleet, waits for a termination signal, then stops it
    /// gracefully.
    pub async fn run_until_signal(self: &Arc<Self>) -> Result<(), RuntimeError> {
        self.start_all()?;
        if let Err(err) = super::wait_for_stop_signal().await {
            tracing::error!(error = %err, "signal listener failed, stopping");
        }
        self.stop_all(true).await
    }

    /// Point-in-time health of every registered worker.
    pub fn status(&self) -> HashMap<UnitId, WorkerHealth> {
        let entries = lock(&self.entries);
        entries
            .iter()
            .map(|(unit, entry)| {
                (
                    unit.clone(),
                    WorkerHealth {
                        unit: unit.clone(),
                        status: entry.status,
                        beat_age: entry.heartbeat.age(),
                        stale_polls: entry.stale_polls,
                        crashes: entry.crashes,
                    },
                )
            })
            .collect()
    }

    /// Read-only view of one unit's snapshot and history.
    pub fn state(&self, unit: &UnitId) -> Option<Arc<dyn StateAccess>> {
        lock(&self.entries).get(unit).map(|e| e.worker.state())
    }

    /// The agent coordinator of one unit.
    pub fn coordinator(&self, unit: &UnitId) -> Option<Arc<AgentCoordinator>> {
        lock(&self.entries).get(unit).map(|e| e.worker.coordinator())
    }

    /// Stops the fleet.
    ///
    /// Graceful mode cancels all workers, waits up to the configured grace
    /// for them (draining mid-cycle units included), and aborts whatever is
    /// left. Non-graceful mode aborts immediately. Either way the
    /// transaction controller is shut down and every writer is flushed
    /// exactly once afterwards.
    pub async fn stop_all(&self, graceful: bool) -> Result<(), RuntimeError> {
        if !self.running.swap(false, AtomicOrdering::SeqCst) {
            return Ok(());
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.root.cancel();

        let monitor = lock(&self.monitor).take();
        let handles: Vec<(UnitId, JoinHandle<()>)> = {
            let mut entries = lock(&self.entries);
            entries
                .iter_mut()
                .filter_map(|(unit, entry)| {
                    entry.handle.take().map(|h| (unit.clone(), h))
                })
                .collect()
        };

        let mut stuck: Vec<String> = Vec::new();
        if graceful {
            let deadline = Instant::now() + self.config.grace;
            for (unit, mut handle) in handles {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if time::timeout(remaining, &mut handle).await.is_err() {
                    tracing::warn!(unit = %unit, "grace exceeded, aborting worker");
                    handle.abort();
                    stuck.push(unit.to_string());
                }
            }
        } else {
            for (_, handle) in handles {
                handle.abort();
            }
        }

        if let Some(handle) = monitor {
            let _ = handle.await;
        }
        self.txns.shutdown();
        self.registry.flush_all().await;

        {
            let mut entries = lock(&self.entries);
            for entry in entries.values_mut() {
                if matches!(entry.status, WorkerStatus::Running | WorkerStatus::Restarting) {
                    entry.status = WorkerStatus::Stopped;
                }
            }
        }

        if stuck.is_empty() {
            if graceful {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            }
            Ok(())
        } else {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_reason(format!("stuck units: {stuck:?}")),
            );
            Err(RuntimeError::GraceExceeded {
                grace: self.config.grace,
                stuck,
            })
        }
    }

    async fn monitor_loop(self: Arc<Self>) {
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.poll().await;
        }
        tracing::debug!("monitor loop stopped");
    }

    /// One monitor pass: reap finished workers, kill hung ones, perform due
    /// restarts.
    async fn poll(&self) {
        let now = Instant::now();
        let mut finished: Vec<(UnitId, JoinHandle<()>)> = Vec::new();
        let mut hung: Vec<(UnitId, JoinHandle<()>, CancellationToken)> = Vec::new();

        {
            let mut entries = lock(&self.entries);
            for (unit, entry) in entries.iter_mut() {
                if entry.status != WorkerStatus::Running {
                    continue;
                }
                if entry.handle.as_ref().is_some_and(|h| h.is_finished()) {
                    if let Some(handle) = entry.handle.take() {
                        finished.push((unit.clone(), handle));
                    }
                    continue;
                }
                if entry.heartbeat.age() > self.config.poll_interval {
                    entry.stale_polls += 1;
                } else {
                    entry.stale_polls = 0;
                }
                if entry.stale_polls >= self.config.missed_limit {
                    if let Some(handle) = entry.handle.take() {
                        hung.push((unit.clone(), handle, entry.token.clone()));
                    }
                }
            }
        }

        let mut outcomes: Vec<(UnitId, ExitOutcome)> = Vec::new();
        for (unit, handle) in finished {
            outcomes.push((unit, exit_outcome(handle).await));
        }
        for (unit, mut handle, token) in hung {
            tracing::warn!(unit = %unit, "worker heartbeat stale, killing");
            token.cancel();
            if time::timeout(self.config.kill_timeout, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
                let _ = (&mut handle).await;
            }
            outcomes.push((
                unit,
                ExitOutcome::Crashed("heartbeat stale, worker killed".to_string()),
            ));
        }

        let mut entries = lock(&self.entries);
        for (unit, outcome) in outcomes {
            let Some(entry) = entries.get_mut(&unit) else {
                continue;
            };
            match outcome {
                ExitOutcome::Clean => {
                    entry.status = WorkerStatus::Stopped;
                }
                ExitOutcome::Crashed(reason) => self.record_crash(&unit, entry, reason),
            }
        }
        for (unit, entry) in entries.iter_mut() {
            let due = entry.status == WorkerStatus::Restarting
                && entry.restart_at.is_some_and(|at| at <= now);
            if due {
                tracing::info!(unit = %unit, attempt = entry.crashes, "respawning worker");
                spawn_worker(&self.root, entry);
            }
        }
    }

    /// Applies the crash budget for one crashed (or killed) worker.
    fn record_crash(&self, unit: &UnitId, entry: &mut Entry, reason: String) {
        // The crashed generation's agents outlive their worker task; cancel
        // them before a respawn brings up same-named replacements.
        entry.token.cancel();
        entry.crashes += 1;
        self.bus.publish(
            Event::new(EventKind::WorkerCrashed)
                .with_unit(unit.clone())
                .with_attempt(entry.crashes)
                .with_reason(reason.clone()),
        );

        if entry.crashes < self.config.max_restarts {
            entry.status = WorkerStatus::Restarting;
            entry.restart_at = Some(Instant::now() + self.config.cooldown);
            self.bus.publish(
                Event::new(EventKind::WorkerRestartScheduled)
                    .with_unit(unit.clone())
                    .with_attempt(entry.crashes)
                    .with_delay(self.config.cooldown),
            );
        } else {
            entry.status = WorkerStatus::Dead;
            entry.restart_at = None;
            tracing::error!(unit = %unit, crashes = entry.crashes, "crash budget exhausted");
            self.bus.publish(
                Event::new(EventKind::WorkerDead)
                    .with_unit(unit.clone())
                    .with_attempt(entry.crashes)
                    .with_reason(reason),
            );
        }
    }
}

/// Spawns (or respawns) the worker task for one entry.
fn spawn_worker(root: &CancellationToken, entry: &mut Entry) {
    let token = root.child_token();
    entry.token = token.clone();
    entry.status = WorkerStatus::Running;
    entry.stale_polls = 0;
    entry.restart_at = None;
    entry.heartbeat.beat();
    let worker = Arc::clone(&entry.worker);
    entry.handle = Some(tokio::spawn(worker.run(token)));
}

async fn exit_outcome(handle: JoinHandle<()>) -> ExitOutcome {
    match handle.await {
        Ok(()) => ExitOutcome::Clean,
        Err(err) if err.is_panic() => ExitOutcome::Crashed(format!("worker panicked: {err}")),
        Err(err) => ExitOutcome::Crashed(format!("worker task aborted: {err}")),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
