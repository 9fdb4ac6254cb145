//! # unitvisor
//!
//! **Unitvisor** is a parallel per-unit orchestration library for Rust.
//!
//! It supervises one worker per tracked external *unit*: each worker runs an
//! adaptive acquisition loop against an opaque backend, derives a discrete
//! phase from every reading, persists completed cycles through shared batch
//! writers, and hosts behavior agents that act on the unit through atomic
//! multi-step transactions. The crate is designed as a building block for
//! fleet monitors and automation daemons.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  WorkerSpec  │   │  WorkerSpec  │   │  WorkerSpec  │
//!     │  (unit #1)   │   │  (unit #2)   │   │  (unit #3)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator (fleet supervisor)                                  │
//! │  - heartbeat monitor (stale ⇒ kill ⇒ crash budget)                │
//! │  - crash budget: restart with cooldown, then Dead                 │
//! │  - graceful stop: cancel ─► drain ─► grace ─► final flush         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │UnitWorker│       │UnitWorker│       │UnitWorker│    one task per unit
//!   │ acquire  │       │ acquire  │       │ acquire  │    (panics isolated)
//!   │ loop     │       │ loop     │       │ loop     │
//!   └─┬───┬──┬─┘       └──────────┘       └──────────┘
//!     │   │  └─ agents ──► AgentCoordinator (≤1 active per unit)
//!     │   │                    └─► TransactionController
//!     │   │                          (per-unit FIFO, timeout, rollback)
//!     │   └─ records ──► WriterRegistry ──► BatchWriter (shared per kind)
//!     │                                        └─► RecordSink (batched I/O)
//!     ▼
//!   EventBus (bounded per-subscriber queues, rate limit, panic isolation)
//!     ├─► LogWriter (feature "logging")
//!     └─► user subscribers
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! register(spec) ──► Orchestrator ──► UnitWorker::run(token)
//!
//! loop {
//!   ├─► beat heartbeat
//!   ├─► acquire(regions) under timeout
//!   │       │
//!   │       ├─ Some(snapshot) ─► phase change? ─► publish PhaseChanged
//!   │       │                    into Ended?   ─► history + cycle record
//!   │       │                    collectors    ─► WriterRegistry
//!   │       │
//!   │       └─ miss (None / error / timeout) ─► skip cycle, never fabricate
//!   │              └─ 3 in a row ─► AcquireMissStreak (warning)
//!   │
//!   └─► sleep(interval for phase)   # Active: short; idle phases ≥ 6×
//! }
//!
//! On cancel: finish the in-flight cycle if Active (drain), then exit.
//! On panic: caught at the join boundary; crash budget decides restart/Dead.
//! ```
//!
//! ## Features
//! | Area             | Description                                                       | Key types / traits                          |
//! |------------------|-------------------------------------------------------------------|---------------------------------------------|
//! | **Acquisition**  | Pluggable per-unit reading backends with adaptive cadence.        | [`Acquire`], [`AcquireFn`], [`IntervalPolicy`] |
//! | **Supervision**  | Heartbeats, crash budgets, graceful drain for the whole fleet.    | [`Orchestrator`], [`WorkerSpec`], [`WorkerHealth`] |
//! | **Persistence**  | Shared batch writers with size+time thresholds and bounded retry. | [`BatchWriter`], [`WriterRegistry`], [`RecordSink`] |
//! | **Transactions** | Atomic multi-step actions, serialized per unit, with rollback.    | [`TransactionController`], [`Step`], [`StepExecutor`] |
//! | **Agents**       | Mutually exclusive behaviors driven by pure decision policies.    | [`Agent`], [`AgentCoordinator`], [`DecisionPolicy`] |
//! | **Events**       | Bounded non-blocking fan-out of runtime events.                   | [`EventBus`], [`Event`], [`Subscribe`]      |
//! | **Errors**       | Typed errors per seam, with stable log labels.                    | [`RuntimeError`], [`AcquireError`], [`TxnError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber that
//!   forwards events to `tracing` _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use unitvisor::{
//!     AcquireFn, BatchWriter, BatchWriterConfig, EventBus, MemorySink, Orchestrator,
//!     OrchestratorConfig, Phase, RecordKind, StateSnapshot, TransactionController,
//!     TxnConfig, WorkerConfig, WorkerSpec, WriterRegistry,
//! };
//!
//! # struct NoopExec;
//! # #[async_trait::async_trait]
//! # impl unitvisor::StepExecutor for NoopExec {
//! #     async fn apply(&self, _: &unitvisor::UnitId, _: &unitvisor::Step) -> anyhow::Result<()> { Ok(()) }
//! #     async fn rollback(&self, _: &unitvisor::UnitId, _: &unitvisor::Step) -> anyhow::Result<()> { Ok(()) }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::default();
//!     let registry = WriterRegistry::new();
//!     registry.register(BatchWriter::new(
//!         RecordKind::CYCLE,
//!         MemorySink::shared(),
//!         BatchWriterConfig::default(),
//!         bus.clone(),
//!     ));
//!     let txns = TransactionController::new(Arc::new(NoopExec), TxnConfig::default(), bus.clone());
//!
//!     let orch = Orchestrator::new(OrchestratorConfig::default(), bus, registry, txns);
//!     orch.register(WorkerSpec::new(
//!         WorkerConfig::new("unit-1", 0),
//!         AcquireFn::arc("stub", |_cfg| async {
//!             Ok(Some(StateSnapshot::new(Phase::Waiting)))
//!         }),
//!     ))?;
//!
//!     orch.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod agents;
pub mod collect;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod policies;
pub mod sink;
pub mod txn;
pub mod unit;

// ---- Public re-exports ----

pub use acquire::{Acquire, AcquireFn, AcquireRef, IntervalPolicy};
pub use agents::{
    ActionPlan, Agent, AgentContext, AgentCoordinator, AgentRef, DecisionPolicy, PlannedStep,
    PolicyRef, StateAccess, StateCell,
};
pub use collect::{Collector, CollectorFn, CollectorRef};
pub use config::{OrchestratorConfig, RegionSpec, WorkerConfig};
pub use core::{wait_for_stop_signal, Orchestrator, WorkerHealth, WorkerSpec, WorkerStatus};
pub use error::{AcquireError, AgentError, RuntimeError, SinkError, TxnError};
pub use events::{
    BusConfig, BusStats, Event, EventBus, EventFilter, EventKind, OverflowPolicy, Severity,
    Subscribe, SubscriptionId,
};
pub use policies::BackoffPolicy;
pub use sink::{
    BatchWriter, BatchWriterConfig, MemorySink, Record, RecordKind, RecordSink, SinkRef,
    WriterRegistry, WriterStats,
};
pub use txn::{
    ExecutorRef, Step, StepExecutor, Transaction, TransactionController, TransactionId,
    TxnCallback, TxnConfig, TxnReport, TxnStatus,
};
pub use unit::{BoundedHistory, CycleRecord, Phase, StateSnapshot, UnitId};

// Optional: expose the built-in tracing-backed subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogWriter;
