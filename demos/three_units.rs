//! Three supervised units with simulated acquisition backends.
//!
//! Run with: `cargo run --example three_units --features logging`
//!
//! Each unit cycles WAITING → ACTIVE → ENDED on its own rhythm; completed
//! cycles are batched into an in-memory sink and all runtime events are
//! logged via the built-in `LogWriter`. The fleet runs for ten seconds and
//! then stops gracefully.

use std::sync::Arc;
use std::time::Duration;

use unitvisor::{
    AcquireFn, AcquireRef, BatchWriter, BatchWriterConfig, EventBus, EventFilter, IntervalPolicy,
    LogWriter, MemorySink, Orchestrator, OrchestratorConfig, Phase, RecordKind, StateSnapshot,
    Step, StepExecutor, Subscribe, TransactionController, TxnConfig, UnitId, WorkerConfig,
    WorkerSpec, WriterRegistry,
};

struct PrintExec;

#[async_trait::async_trait]
impl StepExecutor for PrintExec {
    async fn apply(&self, unit: &UnitId, step: &Step) -> anyhow::Result<()> {
        println!("apply {unit}: {}", step.target);
        Ok(())
    }
    async fn rollback(&self, unit: &UnitId, step: &Step) -> anyhow::Result<()> {
        println!("rollback {unit}: {}", step.target);
        Ok(())
    }
}

/// Simulated backend: loops WAITING (x3), ACTIVE (x4), ENDED, offset per unit.
fn simulated(offset: usize) -> AcquireRef {
    let mut tick = offset;
    AcquireFn::arc("simulated", move |_cfg| {
        let phase = match tick % 8 {
            0..=2 => Phase::Waiting,
            3..=6 => Phase::Active,
            _ => Phase::Ended,
        };
        tick += 1;
        async move {
            Ok(Some(
                StateSnapshot::new(phase).with_value("phase", phase.as_label().into()),
            ))
        }
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
        BatchWriterConfig {
            batch_size: 5,
            flush_interval: Duration::from_secs(2),
            ..BatchWriterConfig::default()
        },
        bus.clone(),
    ));

    let txns = TransactionController::new(Arc::new(PrintExec), TxnConfig::default(), bus.clone());
    let orch = Orchestrator::new(
        OrchestratorConfig {
            poll_interval: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        },
        bus,
        registry,
        txns,
    );

    let intervals = IntervalPolicy {
        active: Duration::from_millis(200),
        waiting: Duration::from_millis(1200),
        ended: Duration::from_millis(1200),
        unknown: Duration::from_millis(1200),
    };
    for (i, unit) in ["alpha", "beta", "gamma"].into_iter().enumerate() {
        orch.register(
            WorkerSpec::new(WorkerConfig::new(unit, i as u32), simulated(i * 3))
                .with_intervals(intervals),
        )?;
    }

    orch.start_all()?;
    tokio::time::sleep(Duration::from_secs(10)).await;

    for (unit, health) in orch.status() {
        println!(
            "{unit}: {} (crashes: {})",
            health.status.as_label(),
            health.crashes
        );
    }
    orch.stop_all(true).await?;
    println!(
        "persisted {} cycle records in {} batches",
        sink.record_count(),
        sink.batch_count()
    );
    Ok(())
}
