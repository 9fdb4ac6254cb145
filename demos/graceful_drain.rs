//! Graceful shutdown with a unit mid-cycle.
//!
//! Run with: `cargo run --example graceful_drain --features logging`
//!
//! One unit is permanently WAITING; the other enters a long ACTIVE cycle.
//! Press Ctrl-C (or wait for the built-in timer) while the cycle is in
//! flight: the waiting unit stops immediately, the active unit keeps
//! sampling until its cycle ENDs, the cycle record is flushed, and only then
//! does the process exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use unitvisor::{
    AcquireFn, AcquireRef, BatchWriter, BatchWriterConfig, EventBus, EventFilter, IntervalPolicy,
    LogWriter, MemorySink, Orchestrator, OrchestratorConfig, Phase, RecordKind, StateSnapshot,
    Step, StepExecutor, Subscribe, TransactionController, TxnConfig, UnitId, WorkerConfig,
    WorkerSpec, WriterRegistry,
};

struct NoopExec;

#[async_trait::async_trait]
impl StepExecutor for NoopExec {
    async fn apply(&self, _: &UnitId, _: &Step) -> anyhow::Result<()> {
        Ok(())
    }
    async fn rollback(&self, _: &UnitId, _: &Step) -> anyhow::Result<()> {
        Ok(())
    }
}

/// ACTIVE for `active_for` from startup, ENDED afterwards.
fn long_cycle(active_for: Duration) -> AcquireRef {
    let started = Instant::now();
    AcquireFn::arc("long-cycle", move |_cfg| {
        let phase = if started.elapsed() < active_for {
            Phase::Active
        } else {
            Phase::Ended
        };
        async move { Ok(Some(StateSnapshot::new(phase))) }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bus = EventBus::default();
    bus.subscribe(EventFilter::All, Arc::new(LogWriter) as Arc<dyn Subscribe>);

    let sink = MemorySink::shared();
    let registry = WriterRegistry::new();
    registry.register(BatchWriter::new(
        RecordKind::CYCLE,
        sink.clone(),
        BatchWriterConfig::default(),
        bus.clone(),
    ));
    let txns = TransactionController::new(Arc::new(NoopExec), TxnConfig::default(), bus.clone());

    let orch = Orchestrator::new(
        OrchestratorConfig {
            grace: Duration::from_secs(15),
            ..OrchestratorConfig::default()
        },
        bus,
        registry,
        txns,
    );

    let intervals = IntervalPolicy {
        active: Duration::from_millis(300),
        waiting: Duration::from_secs(2),
        ended: Duration::from_secs(2),
        unknown: Duration::from_secs(2),
    };
    orch.register(
        WorkerSpec::new(WorkerConfig::new("busy", 0), long_cycle(Duration::from_secs(8)))
            .with_intervals(intervals),
    )?;
    orch.register(
        WorkerSpec::new(
            WorkerConfig::new("idle", 1),
            AcquireFn::arc("waiting", |_cfg| async {
                Ok(Some(StateSnapshot::new(Phase::Waiting)))
            }),
        )
        .with_intervals(intervals),
    )?;

    orch.start_all()?;
    println!("fleet up; stopping in 3s while 'busy' is mid-cycle (or press Ctrl-C)");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(3)) => {}
        _ = unitvisor::wait_for_stop_signal() => {}
    }

    let before = Instant::now();
    orch.stop_all(true).await?;
    println!(
        "drained in {:?}; {} cycle record(s) persisted",
        before.elapsed(),
        sink.record_count()
    );
    Ok(())
}
