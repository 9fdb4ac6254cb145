//! Atomic multi-step transaction controller, serialized per unit.
//!
//! ## Architecture
//! ```text
//! execute(unit, steps, callback)
//!     │
//!     ├── unit "a" ──► [lane queue a] ──► lane task a ──► apply steps in order
//!     ├── unit "b" ──► [lane queue b] ──► lane task b ──►   │
//!     └── unit "c" ──► [lane queue c] ──► lane task c       ▼
//!                      (FIFO, bounded)              failure at step k:
//!                                                   rollback k-1 … 0, status Failed
//! ```
//!
//! ## Rules
//! - **Single-flight per unit**: one lane task per unit id processes
//!   transactions strictly FIFO; concurrent submitters queue, never
//!   interleave. Lanes for different units are fully independent.
//! - **Declared order**: steps apply in order; the first failure or timeout
//!   stops the walk and rolls back every applied step in reverse order
//!   before the terminal status is set.
//! - **Timeouts**: each step runs under its own timeout; exceeding it aborts
//!   the transaction as [`TxnStatus::TimedOut`] (rollback included) instead
//!   of hanging the lane.
//! - **Retry policy**: by default only the first step is retried (idempotent
//!   entry point); later steps have a per-step opt-in budget
//!   ([`Step::retries`]). Timeouts are never retried.
//! - **Terminal exactly once**: status is set to a terminal value once, the
//!   event is published once, and the callback fires once.
//! - **Shutdown**: queued transactions are drained as
//!   [`TxnStatus::Cancelled`] (callbacks still fire); an in-flight
//!   transaction finishes its rollback-or-commit first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TxnError;
use crate::events::{Event, EventBus, EventKind};
use crate::unit::UnitId;

use super::{
    ExecutorRef, Step, Transaction, TransactionId, TxnCallback, TxnReport, TxnStatus,
};

/// Controller-wide knobs.
#[derive(Debug, Clone)]
pub struct TxnConfig {
    /// Timeout applied to steps without an explicit one.
    pub default_step_timeout: Duration,
    /// Bounded FIFO depth per unit lane.
    pub lane_capacity: usize,
    /// Retry budget applied to the first step when [`Step::retries`] is `None`.
    pub first_step_retries: u32,
}

impl Default for TxnConfig {
    /// `default_step_timeout = 30s`, `lane_capacity = 64`,
    /// `first_step_retries = 2`.
    fn default() -> Self {
        Self {
            default_step_timeout: Duration::from_secs(30),
            lane_capacity: 64,
            first_step_retries: 2,
        }
    }
}

struct Job {
    txn: Transaction,
    callback: Option<TxnCallback>,
}

struct CtrlShared {
    executor: ExecutorRef,
    config: TxnConfig,
    bus: EventBus,
    lanes: Mutex<HashMap<UnitId, mpsc::Sender<Job>>>,
    statuses: RwLock<HashMap<TransactionId, TxnStatus>>,
    next_id: AtomicU64,
    token: CancellationToken,
}

/// Per-unit serialized transaction executor.
///
/// Cheap to clone; all clones share the same lanes and status table.
#[derive(Clone)]
pub struct TransactionController {
    shared: Arc<CtrlShared>,
}

impl TransactionController {
    /// Creates a controller in front of the given action executor.
    pub fn new(executor: ExecutorRef, config: TxnConfig, bus: EventBus) -> Self {
        Self {
            shared: Arc::new(CtrlShared {
                executor,
                config,
                bus,
                lanes: Mutex::new(HashMap::new()),
                statuses: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Submits a transaction for the unit's FIFO lane.
    ///
    /// Returns immediately with the assigned id; progress is observable via
    /// [`status`](Self::status), the callback, and bus events. Must be
    /// called from within a tokio runtime (lanes are spawned lazily).
    pub fn execute(
        &self,
        unit: UnitId,
        steps: Vec<Step>,
        callback: Option<TxnCallback>,
    ) -> Result<TransactionId, TxnError> {
        if self.shared.token.is_cancelled() {
            return Err(TxnError::Closed);
        }

        let id = TransactionId(self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        self.set_status(id, TxnStatus::Pending);

        let job = Job {
            txn: Transaction {
                id,
                unit: unit.clone(),
                steps,
            },
            callback,
        };

        let sender = self.lane(&unit);
        if let Err(err) = sender.try_send(job) {
            self.clear_status(id);
            return match err {
                mpsc::error::TrySendError::Full(_) => Err(TxnError::QueueFull {
                    unit: unit.to_string(),
                }),
                mpsc::error::TrySendError::Closed(_) => Err(TxnError::Closed),
            };
        }
        Ok(id)
    }

    /// Current status of a transaction, if known.
    ///
    /// Terminal statuses are retained until [`forget`](Self::forget) is
    /// called for the id.
    pub fn status(&self, id: TransactionId) -> Option<TxnStatus> {
        self.shared.statuses.read().ok()?.get(&id).copied()
    }

    /// Drops the retained terminal status of a transaction.
    pub fn forget(&self, id: TransactionId) {
        self.clear_status(id);
    }

    /// Stops accepting work and cancels queued transactions.
    ///
    /// In-flight transactions finish (including rollback) before their lane
    /// exits; queued ones terminate as [`TxnStatus::Cancelled`] with their
    /// callbacks invoked.
    pub fn shutdown(&self) {
        self.shared.token.cancel();
    }

    fn lane(&self, unit: &UnitId) -> mpsc::Sender<Job> {
        let mut lanes = match self.shared.lanes.lock() {
            Ok(lanes) => lanes,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sender) = lanes.get(unit) {
            return sender.clone();
        }
        let (tx, rx) = mpsc::channel(self.shared.config.lane_capacity.max(1));
        lanes.insert(unit.clone(), tx.clone());

        let shared = Arc::clone(&self.shared);
        let unit = unit.clone();
        tokio::spawn(async move {
            lane_loop(shared, unit, rx).await;
        });
        tx
    }

    fn set_status(&self, id: TransactionId, status: TxnStatus) {
        if let Ok(mut statuses) = self.shared.statuses.write() {
            statuses.insert(id, status);
        }
    }

    fn clear_status(&self, id: TransactionId) {
        if let Ok(mut statuses) = self.shared.statuses.write() {
            statuses.remove(&id);
        }
    }
}

async fn lane_loop(shared: Arc<CtrlShared>, unit: UnitId, mut rx: mpsc::Receiver<Job>) {
    loop {
        // Checked up front so a job queued before shutdown is cancelled, not
        // raced against the cancellation branch below.
        if shared.token.is_cancelled() {
            while let Ok(job) = rx.try_recv() {
                finish(
                    &shared,
                    job,
                    TxnStatus::Cancelled,
                    None,
                    Some("controller shut down".to_string()),
                );
            }
            break;
        }
        tokio::select! {
            _ = shared.token.cancelled() => continue,
            job = rx.recv() => match job {
                Some(job) => run_transaction(&shared, &unit, job).await,
                None => break,
            },
        }
    }
    tracing::debug!(unit = %unit, "transaction lane closed");
}

async fn run_transaction(shared: &Arc<CtrlShared>, unit: &UnitId, job: Job) {
    let id = job.txn.id;
    if let Ok(mut statuses) = shared.statuses.write() {
        statuses.insert(id, TxnStatus::Executing);
    }

    let mut applied: Vec<usize> = Vec::new();
    let mut failure: Option<(usize, TxnError)> = None;

    for (index, step) in job.txn.steps.iter().enumerate() {
        match apply_step(shared, unit, index, step).await {
            Ok(()) => applied.push(index),
            Err(err) => {
                failure = Some((index, err));
                break;
            }
        }
    }

    match failure {
        None => finish(shared, job, TxnStatus::Completed, None, None),
        Some((index, err)) => {
            rollback_applied(shared, unit, &job.txn.steps, &applied).await;
            let status = match &err {
                TxnError::StepTimeout { .. } => TxnStatus::TimedOut,
                _ => TxnStatus::Failed,
            };
            finish(shared, job, status, Some(index), Some(err.to_string()));
        }
    }
}

/// Applies one step under its timeout and retry budget.
///
/// Timeouts are not retried: a step that exceeded its budget may still be
/// in flight on the executor side, and re-entering it would race the
/// original attempt.
async fn apply_step(
    shared: &Arc<CtrlShared>,
    unit: &UnitId,
    index: usize,
    step: &Step,
) -> Result<(), TxnError> {
    let timeout = step.timeout.unwrap_or(shared.config.default_step_timeout);
    let budget = step.retries.unwrap_or(if index == 0 {
        shared.config.first_step_retries
    } else {
        0
    });

    let mut attempt: u32 = 0;
    loop {
        match tokio::time::timeout(timeout, shared.executor.apply(unit, step)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) if attempt < budget => {
                attempt += 1;
                tracing::warn!(
                    unit = %unit,
                    step = index,
                    target = %step.target,
                    attempt,
                    error = %err,
                    "step failed, retrying"
                );
            }
            Ok(Err(err)) => {
                return Err(TxnError::StepFailed {
                    index,
                    target: step.target.to_string(),
                    reason: format!("{err:#}"),
                });
            }
            Err(_) => {
                return Err(TxnError::StepTimeout {
                    index,
                    target: step.target.to_string(),
                    timeout,
                });
            }
        }
    }
}

async fn rollback_applied(
    shared: &Arc<CtrlShared>,
    unit: &UnitId,
    steps: &[Step],
    applied: &[usize],
) {
    for &index in applied.iter().rev() {
        let step = &steps[index];
        if let Err(err) = shared.executor.rollback(unit, step).await {
            // Cannot be recovered here; the executor owns the external state.
            tracing::error!(
                unit = %unit,
                step = index,
                target = %step.target,
                error = %err,
                "rollback failed"
            );
        }
    }
}

fn finish(
    shared: &Arc<CtrlShared>,
    job: Job,
    status: TxnStatus,
    failed_step: Option<usize>,
    reason: Option<String>,
) {
    debug_assert!(status.is_terminal());
    let id = job.txn.id;
    let unit = job.txn.unit.clone();

    if let Ok(mut statuses) = shared.statuses.write() {
        statuses.insert(id, status);
    }

    let kind = if status == TxnStatus::Completed {
        EventKind::TxnCompleted
    } else {
        EventKind::TxnFailed
    };
    let detail = match &reason {
        Some(reason) => format!("{id}: {reason}"),
        None => format!("{id}: {status:?}"),
    };
    shared
        .bus
        .publish(Event::new(kind).with_unit(unit.clone()).with_reason(detail));

    if let Some(callback) = job.callback {
        callback(TxnReport {
            id,
            unit,
            status,
            failed_step,
            reason,
        });
    }
}
