//! The per-unit worker: adaptive acquisition loop, phase tracking, and
//! record routing.
//!
//! ## Architecture
//! ```text
//!  run(token)
//!     │ stagger(index)
//!     ▼
//!  ┌─────────────────── cycle loop ───────────────────┐
//!  │ beat ──► acquire(timeout) ──► hit? ──────────────│──► snapshot/phase
//!  │                │                │                │    history + records
//!  │                │ miss           └── collectors ──│──► writer registry
//!  │                ▼                                 │
//!  │        skip cycle (streak)                       │
//!  │                                                  │
//!  │        sleep(interval for phase) ◄───────────────┘
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **Never fabricate**: a miss (`Ok(None)`, error, or timeout) skips the
//!   cycle entirely; state, history, and records are untouched.
//! - **Adaptive cadence**: the sleep after each cycle follows
//!   [`IntervalPolicy::for_phase`] for the phase just observed. Sleeps are
//!   chunked so the heartbeat stays fresh; the monitor only ever sees a
//!   stale beat when the loop is truly stuck.
//! - **Cycle completion**: only the transition *into* [`Phase::Ended`]
//!   appends a [`CycleRecord`] and emits the cycle completion record.
//! - **Graceful drain**: a cancelled worker that is mid-cycle
//!   ([`Phase::Active`]) keeps sampling at the active interval until the
//!   cycle leaves `Active`, then exits.

use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::acquire::{AcquireRef, IntervalPolicy};
use crate::agents::{AgentContext, AgentCoordinator, AgentRef, StateAccess, StateCell};
use crate::collect::CollectorRef;
use crate::config::WorkerConfig;
use crate::events::{Event, EventBus, EventKind};
use crate::sink::{Record, WriterRegistry};
use crate::txn::TransactionController;
use crate::unit::{CycleRecord, Phase, UnitId, DEFAULT_HISTORY_CAPACITY};

/// Consecutive misses that trigger the warning event.
const MISS_WARN_STREAK: u32 = 3;

/// Everything needed to run one unit's worker.
pub struct WorkerSpec {
    /// Immutable per-unit configuration.
    pub config: WorkerConfig,
    /// Acquisition backend for this unit.
    pub acquirer: AcquireRef,
    /// Phase-adaptive cadence.
    pub intervals: IntervalPolicy,
    /// Collectors run after every successful acquisition.
    pub collectors: Vec<CollectorRef>,
    /// Behavior agents bound to this unit.
    pub agents: Vec<AgentRef>,
    /// Completed-cycle history capacity.
    pub history_capacity: usize,
}

impl WorkerSpec {
    /// Creates a spec with default intervals, no collectors, and no agents.
    pub fn new(config: WorkerConfig, acquirer: AcquireRef) -> Self {
        Self {
            config,
            acquirer,
            intervals: IntervalPolicy::default(),
            collectors: Vec::new(),
            agents: Vec::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Overrides the interval policy (builder style).
    pub fn with_intervals(mut self, intervals: IntervalPolicy) -> Self {
        self.intervals = intervals;
        self
    }

    /// Adds a collector (builder style).
    pub fn with_collector(mut self, collector: CollectorRef) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Adds a behavior agent (builder style).
    pub fn with_agent(mut self, agent: AgentRef) -> Self {
        self.agents.push(agent);
        self
    }

    /// Overrides the history capacity (builder style).
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}

/// One unit's supervised worker. Restartable: the orchestrator may call
/// [`run`](Self::run) again after a crash with a fresh token.
pub(crate) struct UnitWorker {
    spec: WorkerSpec,
    state: Arc<StateCell>,
    coordinator: Arc<AgentCoordinator>,
    heartbeat: Arc<super::Heartbeat>,
    bus: EventBus,
    registry: WriterRegistry,
    txns: TransactionController,
    stagger: Duration,
    beat_every: Duration,
    miss_streak: AtomicU32,
}

impl UnitWorker {
    pub(crate) fn new(
        spec: WorkerSpec,
        bus: EventBus,
        registry: WriterRegistry,
        txns: TransactionController,
        stagger: Duration,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let unit = spec.config.unit.clone();
        let state = StateCell::new(spec.history_capacity);
        let coordinator = AgentCoordinator::new(unit, bus.clone());
        Arc::new(Self {
            spec,
            state,
            coordinator,
            heartbeat: super::Heartbeat::new(),
            bus,
            registry,
            txns,
            stagger,
            // Beat at twice the monitor's poll rate so an idle interval
            // longer than poll_interval never reads as a hang.
            beat_every: (poll_interval / 2).max(Duration::from_millis(1)),
            miss_streak: AtomicU32::new(0),
        })
    }

    pub(crate) fn unit(&self) -> &UnitId {
        &self.spec.config.unit
    }

    pub(crate) fn heartbeat(&self) -> Arc<super::Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    /// Read-only view of this worker's state, shareable outside the loop.
    pub(crate) fn state(&self) -> Arc<dyn StateAccess> {
        Arc::clone(&self.state) as Arc<dyn StateAccess>
    }

    pub(crate) fn coordinator(&self) -> Arc<AgentCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Runs the acquisition loop until cancelled (plus drain) or panicking.
    ///
    /// Each invocation re-registers and re-spawns this worker's agents. The
    /// orchestrator cancels the previous generation's token before a
    /// respawn, so its agents exit and release the active slot instead of
    /// acting alongside their replacements.
    pub(crate) async fn run(self: Arc<Self>, token: CancellationToken) {
        let unit = self.unit().clone();
        self.heartbeat.beat();
        self.miss_streak.store(0, AtomicOrdering::Relaxed);

        // Deterministic start offset so N workers do not acquire in lock-step.
        let offset = self.stagger * self.spec.config.index;
        if !offset.is_zero() {
            tokio::select! {
                _ = time::sleep(offset) => {}
                _ = token.cancelled() => return,
            }
        }

        self.bus
            .publish(Event::new(EventKind::WorkerStarted).with_unit(unit.clone()));
        self.spawn_agents(&token);

        let mut draining = false;
        loop {
            self.heartbeat.beat();

            if token.is_cancelled() {
                let phase = self.state.snapshot().phase;
                if phase == Phase::Active {
                    if !draining {
                        draining = true;
                        tracing::debug!(unit = %unit, "shutdown mid-cycle, draining");
                    }
                } else {
                    break;
                }
            }

            let phase = match self.cycle(&unit).await {
                Some(phase) => phase,
                None => self.state.snapshot().phase,
            };

            let interval = if draining {
                self.spec.intervals.active
            } else {
                self.spec.intervals.for_phase(phase)
            };
            self.sleep_with_beats(interval, &token, draining).await;
        }

        self.bus
            .publish(Event::new(EventKind::WorkerStopped).with_unit(unit));
    }

    /// Sleeps for `interval` in heartbeat-sized chunks.
    ///
    /// Cancellation cuts the sleep short unless the worker is draining; the
    /// outer loop re-checks the token either way.
    async fn sleep_with_beats(&self, interval: Duration, token: &CancellationToken, draining: bool) {
        let deadline = time::Instant::now() + interval;
        loop {
            let remaining = deadline.saturating_duration_since(time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let chunk = remaining.min(self.beat_every);
            tokio::select! {
                _ = time::sleep(chunk) => {}
                _ = token.cancelled(), if !draining => break,
            }
            self.heartbeat.beat();
        }
    }

    /// One acquisition cycle; returns the observed phase on a hit.
    async fn cycle(&self, unit: &UnitId) -> Option<Phase> {
        let acquired = time::timeout(
            self.spec.config.acquire_timeout,
            self.spec.acquirer.acquire(&self.spec.config),
        )
        .await;

        let snapshot = match acquired {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => {
                self.miss(unit, "no recognizable reading");
                return None;
            }
            Ok(Err(err)) => {
                self.miss(unit, &err.to_string());
                return None;
            }
            Err(_) => {
                self.miss(unit, "acquisition timed out");
                return None;
            }
        };

        self.miss_streak.store(0, AtomicOrdering::Relaxed);
        let prev = self.state.snapshot().phase;
        let phase = snapshot.phase;
        self.state.set_snapshot(snapshot.clone());

        if phase != prev {
            self.bus.publish(
                Event::new(EventKind::PhaseChanged)
                    .with_unit(unit.clone())
                    .with_phases(prev, phase),
            );
        }
        if phase == Phase::Ended && prev != Phase::Ended {
            let record = CycleRecord::from_snapshot(unit.clone(), snapshot.clone());
            self.state.push_cycle(record.clone());
            self.registry.route(Record::from_cycle(&record));
            self.bus
                .publish(Event::new(EventKind::CycleCompleted).with_unit(unit.clone()));
        }

        for collector in &self.spec.collectors {
            for record in collector.collect(unit, &snapshot) {
                self.registry.route(record);
            }
        }
        Some(phase)
    }

    /// Counts a missed cycle; warns once per streak at the threshold.
    fn miss(&self, unit: &UnitId, reason: &str) {
        let streak = self.miss_streak.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        tracing::debug!(unit = %unit, streak, reason, "acquisition miss, cycle skipped");
        if streak == MISS_WARN_STREAK {
            self.bus.publish(
                Event::new(EventKind::AcquireMissStreak)
                    .with_unit(unit.clone())
                    .with_attempt(streak)
                    .with_reason(reason.to_string()),
            );
        }
    }

    fn spawn_agents(&self, token: &CancellationToken) {
        for agent in &self.spec.agents {
            let gate = match self.coordinator.register(agent.name()) {
                Ok(gate) => gate,
                Err(err) => {
                    tracing::error!(
                        unit = %self.unit(),
                        agent = agent.name(),
                        error = %err,
                        "agent registration failed"
                    );
                    continue;
                }
            };
            let ctx = AgentContext::new(
                self.unit().clone(),
                self.state(),
                self.coordinator(),
                self.txns.clone(),
                self.bus.clone(),
                token.child_token(),
                gate,
            );
            let agent = Arc::clone(agent);
            let coordinator = self.coordinator();
            let unit = self.unit().clone();
            tokio::spawn(async move {
                if let Err(err) = agent.run(ctx).await {
                    tracing::warn!(
                        unit = %unit,
                        agent = agent.name(),
                        error = %err,
                        "agent failed"
                    );
                }
                // Release the active slot for agents that exited without
                // calling finish themselves.
                let _ = coordinator.finish(agent.name());
            });
        }
    }
}
