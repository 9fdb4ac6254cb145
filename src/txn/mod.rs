//! Atomic multi-step transactions with per-unit serialization.
//!
//! ## Contents
//! - [`Step`], [`Transaction`], [`TxnStatus`], [`TxnReport`] — data model
//! - [`StepExecutor`] — the action-execution collaborator seam
//! - [`TransactionController`] — FIFO lanes, timeouts, rollback

mod controller;
mod executor;
mod transaction;

pub use controller::{TransactionController, TxnConfig};
pub use executor::{ExecutorRef, StepExecutor};
pub use transaction::{Step, Transaction, TransactionId, TxnCallback, TxnReport, TxnStatus};
