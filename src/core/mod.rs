//! Orchestration core: workers, supervision, and shutdown.
//!
//! ## Contents
//! - [`WorkerSpec`] — everything needed to run one unit's worker
//! - [`Orchestrator`] — fleet supervision (heartbeats, restarts, shutdown)
//! - [`WorkerHealth`], [`WorkerStatus`] — monitor-visible worker state
//! - [`wait_for_stop_signal`] — cross-platform termination signals

mod health;
mod orchestrator;
mod shutdown;
mod worker;

pub use health::{WorkerHealth, WorkerStatus};
pub use orchestrator::Orchestrator;
pub use shutdown::wait_for_stop_signal;
pub use worker::WorkerSpec;

pub(crate) use health::Heartbeat;
pub(crate) use worker::UnitWorker;
