//! Fleet-level behavior: per-unit isolation, miss handling, crash budgets,
//! hang detection, and graceful drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use unitvisor::{
    AcquireFn, AcquireRef, BatchWriter, BatchWriterConfig, Event, EventBus, EventFilter,
    EventKind, IntervalPolicy, MemorySink, Orchestrator, OrchestratorConfig, Phase, RecordKind,
    StateSnapshot, Subscribe, TransactionController, TxnConfig, UnitId, WorkerConfig, WorkerSpec,
    WorkerStatus, WriterRegistry,
};

/// Collects the kinds of every observed event.
struct KindLog {
    kinds: Mutex<Vec<EventKind>>,
}

impl KindLog {
    fn shared() -> Arc<Self> {
        Arc::new(Self {
            kinds: Mutex::new(Vec::new()),
        })
    }

    fn count(&self, kind: EventKind) -> usize {
        self.kinds.lock().unwrap().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Subscribe for KindLog {
    async fn on_event(&self, event: &Event) {
        self.kinds.lock().unwrap().push(event.kind);
    }
    fn name(&self) -> &'static str {
        "kind-log"
    }
}

/// Acquirer that replays a fixed phase script, then repeats the last phase.
fn scripted(phases: Vec<Phase>) -> AcquireRef {
    let mut iter = phases.into_iter();
    let mut last = Phase::Waiting;
    AcquireFn::arc("scripted", move |_cfg| {
        if let Some(phase) = iter.next() {
            last = phase;
        }
        let phase = last;
        async move { Ok(Some(StateSnapshot::new(phase))) }
    })
}

fn fast_intervals() -> IntervalPolicy {
    IntervalPolicy {
        active: Duration::from_millis(20),
        waiting: Duration::from_millis(50),
        ended: Duration::from_millis(50),
        unknown: Duration::from_millis(50),
    }
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_millis(100),
        missed_limit: 3,
        max_restarts: 3,
        cooldown: Duration::from_millis(20),
        grace: Duration::from_secs(2),
        kill_timeout: Duration::from_millis(100),
        stagger: Duration::ZERO,
    }
}

struct Fixture {
    orch: Arc<Orchestrator>,
    sink: Arc<MemorySink>,
    log: Arc<KindLog>,
}

fn fixture(config: OrchestratorConfig) -> Fixture {
    let bus = EventBus::default();
    let log = KindLog::shared();
    bus.subscribe(EventFilter::All, Arc::clone(&log) as Arc<dyn Subscribe>);

    let sink = MemorySink::shared();
    let registry = WriterRegistry::new();
    registry.register(BatchWriter::new(
        RecordKind::CYCLE,
        sink.clone(),
        BatchWriterConfig {
            batch_size: 1,
            ..BatchWriterConfig::default()
        },
        bus.clone(),
    ));

    let txns = TransactionController::new(
        Arc::new(NoopExec),
        TxnConfig::default(),
        bus.clone(),
    );
    let orch = Orchestrator::new(config, bus, registry, txns);
    Fixture { orch, sink, log }
}

struct NoopExec;

#[async_trait]
impl unitvisor::StepExecutor for NoopExec {
    async fn apply(&self, _: &UnitId, _: &unitvisor::Step) -> anyhow::Result<()> {
        Ok(())
    }
    async fn rollback(&self, _: &UnitId, _: &unitvisor::Step) -> anyhow::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn one_unit_cycles_while_others_stay_idle() {
    let f = fixture(test_config());

    let scripts: Vec<(&str, Vec<Phase>)> = vec![
        (
            "unit-1",
            vec![Phase::Waiting, Phase::Active, Phase::Active, Phase::Ended, Phase::Waiting],
        ),
        ("unit-2", vec![Phase::Waiting]),
        ("unit-3", vec![Phase::Waiting]),
    ];
    for (i, (unit, script)) in scripts.into_iter().enumerate() {
        f.orch
            .register(
                WorkerSpec::new(WorkerConfig::new(unit, i as u32), scripted(script))
                    .with_intervals(fast_intervals()),
            )
            .unwrap();
    }

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    let one = f.orch.state(&UnitId::new("unit-1")).unwrap();
    let two = f.orch.state(&UnitId::new("unit-2")).unwrap();
    let three = f.orch.state(&UnitId::new("unit-3")).unwrap();

    assert_eq!(one.history().len(), 1, "unit-1 completed exactly one cycle");
    assert_eq!(two.history().len(), 0);
    assert_eq!(three.history().len(), 0);
    assert_eq!(one.snapshot().phase, Phase::Waiting, "back to waiting after the cycle");

    f.orch.stop_all(true).await.unwrap();

    // The completed cycle reached the shared writer and was flushed.
    assert!(f.sink.record_count() >= 1);
    let first = &f.sink.batches()[0][0];
    assert_eq!(first.unit, UnitId::new("unit-1"));
    assert_eq!(f.log.count(EventKind::CycleCompleted), 1);
}

#[tokio::test]
async fn misses_skip_cycles_and_warn_once_per_streak() {
    let f = fixture(test_config());
    let backend: AcquireRef = AcquireFn::arc("always-miss", |_cfg| async { Ok(None) });
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("blind", 0), backend)
                .with_intervals(fast_intervals()),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    f.orch.stop_all(true).await.unwrap();

    let state = f.orch.state(&UnitId::new("blind")).unwrap();
    assert_eq!(state.snapshot().phase, Phase::Unknown, "no value was fabricated");
    assert_eq!(state.history().len(), 0);
    assert_eq!(
        f.log.count(EventKind::AcquireMissStreak),
        1,
        "warned exactly once, at the third consecutive miss"
    );
}

#[tokio::test]
async fn crash_budget_restarts_then_marks_dead() {
    let f = fixture(test_config());
    let backend: AcquireRef =
        AcquireFn::arc("panicking", |_cfg| async { panic!("simulated worker kill") });
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("crashy", 0), backend)
                .with_intervals(fast_intervals()),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let unit = UnitId::new("crashy");
    let status = f.orch.status();
    let health = &status[&unit];
    assert_eq!(health.status, WorkerStatus::Dead);
    assert_eq!(health.crashes, 3, "third crash exhausts the budget");

    // Three crashes, two restarts, one terminal dead notice.
    assert_eq!(f.log.count(EventKind::WorkerCrashed), 3);
    assert_eq!(f.log.count(EventKind::WorkerRestartScheduled), 2);
    assert_eq!(f.log.count(EventKind::WorkerDead), 1);

    f.orch.stop_all(true).await.unwrap();
    assert_eq!(
        f.orch.status()[&unit].status,
        WorkerStatus::Dead,
        "dead units stay dead through shutdown"
    );
}

#[tokio::test]
async fn dead_unit_does_not_disturb_the_rest() {
    let f = fixture(OrchestratorConfig {
        max_restarts: 1,
        ..test_config()
    });
    let crashing: AcquireRef =
        AcquireFn::arc("panicking", |_cfg| async { panic!("simulated worker kill") });
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("crashy", 0), crashing)
                .with_intervals(fast_intervals()),
        )
        .unwrap();
    f.orch
        .register(
            WorkerSpec::new(
                WorkerConfig::new("steady", 1),
                scripted(vec![Phase::Waiting, Phase::Active, Phase::Ended, Phase::Waiting]),
            )
            .with_intervals(fast_intervals()),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;

    let status = f.orch.status();
    assert_eq!(status[&UnitId::new("crashy")].status, WorkerStatus::Dead);
    assert_eq!(status[&UnitId::new("steady")].status, WorkerStatus::Running);
    assert_eq!(
        f.orch.state(&UnitId::new("steady")).unwrap().history().len(),
        1
    );

    f.orch.stop_all(true).await.unwrap();
}

#[tokio::test]
async fn hung_worker_is_killed_and_counted_as_crash() {
    let f = fixture(OrchestratorConfig {
        max_restarts: 1,
        ..test_config()
    });
    // Blocks far beyond the heartbeat budget and ignores cancellation.
    let backend: AcquireRef = AcquireFn::arc("stuck", |_cfg| async {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(None)
    });
    f.orch
        .register(
            WorkerSpec::new(
                WorkerConfig::new("frozen", 0)
                    .with_acquire_timeout(Duration::from_secs(600)),
                backend,
            )
            .with_intervals(fast_intervals()),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(
        f.orch.status()[&UnitId::new("frozen")].status,
        WorkerStatus::Dead
    );
    assert_eq!(f.log.count(EventKind::WorkerCrashed), 1);

    f.orch.stop_all(true).await.unwrap();
}

#[tokio::test]
async fn idle_worker_sleeping_past_the_poll_interval_stays_alive() {
    let f = fixture(OrchestratorConfig {
        max_restarts: 1,
        ..test_config()
    });
    // A legitimate policy: the idle interval dwarfs poll_interval x
    // missed_limit. Sleeping through it must not read as a hang.
    let slow_idle = IntervalPolicy {
        active: Duration::from_millis(100),
        waiting: Duration::from_secs(2),
        ended: Duration::from_secs(2),
        unknown: Duration::from_secs(2),
    };
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("sleepy", 0), scripted(vec![Phase::Waiting]))
                .with_intervals(slow_idle),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(900)).await;

    let status = f.orch.status();
    let health = &status[&UnitId::new("sleepy")];
    assert_eq!(health.status, WorkerStatus::Running);
    assert_eq!(health.crashes, 0);
    assert_eq!(f.log.count(EventKind::WorkerCrashed), 0);

    f.orch.stop_all(true).await.unwrap();
}

#[tokio::test]
async fn graceful_stop_drains_an_active_cycle() {
    let f = fixture(test_config());
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let backend: AcquireRef = AcquireFn::arc("draining", move |_cfg| {
        let phase = if flag.load(Ordering::SeqCst) {
            Phase::Ended
        } else {
            Phase::Active
        };
        async move { Ok(Some(StateSnapshot::new(phase))) }
    });
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("busy", 0), backend)
                .with_intervals(fast_intervals()),
        )
        .unwrap();

    f.orch.start_all().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        f.orch.state(&UnitId::new("busy")).unwrap().snapshot().phase,
        Phase::Active
    );

    // Let the in-flight cycle end shortly after shutdown is requested.
    let release = Arc::clone(&done);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        release.store(true, Ordering::SeqCst);
    });

    f.orch.stop_all(true).await.unwrap();

    let state = f.orch.state(&UnitId::new("busy")).unwrap();
    assert_eq!(
        state.history().len(),
        1,
        "the in-flight cycle was completed, not abandoned"
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.log.count(EventKind::WorkerStopped), 1);
    assert_eq!(f.log.count(EventKind::AllStoppedWithin), 1);
    assert!(f.sink.record_count() >= 1, "final flush persisted the cycle");
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() {
    let f = fixture(test_config());
    f.orch
        .register(
            WorkerSpec::new(WorkerConfig::new("u1", 0), scripted(vec![Phase::Waiting]))
                .with_intervals(fast_intervals()),
        )
        .unwrap();

    let dup = f.orch.register(
        WorkerSpec::new(WorkerConfig::new("u1", 1), scripted(vec![Phase::Waiting]))
            .with_intervals(fast_intervals()),
    );
    assert!(matches!(dup, Err(unitvisor::RuntimeError::DuplicateUnit { .. })));

    let bad = f.orch.register(
        WorkerSpec::new(WorkerConfig::new("u2", 2), scripted(vec![Phase::Waiting]))
            .with_intervals(IntervalPolicy {
                active: Duration::from_millis(50),
                waiting: Duration::from_millis(50),
                ended: Duration::from_millis(50),
                unknown: Duration::from_millis(50),
            }),
    );
    assert!(matches!(
        bad,
        Err(unitvisor::RuntimeError::InvalidIntervals { .. })
    ));
}
