//! Transaction data model: steps, statuses, and completion reports.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::unit::UnitId;

/// Identifier of one transaction, unique per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub(crate) u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Lifecycle status of a transaction.
///
/// `Pending → Executing → Completed | Failed | TimedOut | Cancelled`;
/// the four right-hand statuses are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Queued in its unit's lane, not started.
    Pending,
    /// Steps are being applied.
    Executing,
    /// All steps applied successfully.
    Completed,
    /// A step failed; applied steps were rolled back.
    Failed,
    /// A step exceeded its timeout; applied steps were rolled back.
    TimedOut,
    /// The controller shut down before the transaction started.
    Cancelled,
}

impl TxnStatus {
    /// True once the transaction can no longer change status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TxnStatus::Completed | TxnStatus::Failed | TxnStatus::TimedOut | TxnStatus::Cancelled
        )
    }
}

/// One atomic step of a transaction: a target plus an opaque payload.
#[derive(Debug, Clone)]
pub struct Step {
    /// What the step acts on (executor-defined).
    pub target: Arc<str>,
    /// Executor-defined parameters.
    pub payload: serde_json::Value,
    /// Individual timeout; `None` uses the controller default.
    pub timeout: Option<Duration>,
    /// Retry budget for this step.
    ///
    /// `None` applies the controller policy: only the **first** step of a
    /// transaction is retried (idempotent entry point); later steps run
    /// once, because blindly retrying them risks double-applying
    /// non-idempotent effects. Set an explicit value for steps known to be
    /// idempotent.
    pub retries: Option<u32>,
}

impl Step {
    /// Creates a step with default timeout and retry policy.
    pub fn new(target: impl Into<Arc<str>>, payload: serde_json::Value) -> Self {
        Self {
            target: target.into(),
            payload,
            timeout: None,
            retries: None,
        }
    }

    /// Overrides the step timeout (builder style).
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry budget (builder style).
    #[inline]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// An ordered multi-step action owned by the controller until terminal.
#[derive(Debug)]
pub struct Transaction {
    /// Controller-assigned id.
    pub id: TransactionId,
    /// Unit whose lane serializes this transaction.
    pub unit: UnitId,
    /// Steps in declared execution order.
    pub steps: Vec<Step>,
}

/// Terminal outcome delivered to the submitter's callback.
#[derive(Debug, Clone)]
pub struct TxnReport {
    /// The transaction this report concerns.
    pub id: TransactionId,
    /// Owning unit.
    pub unit: UnitId,
    /// Terminal status.
    pub status: TxnStatus,
    /// Index of the step that failed or timed out, if any.
    pub failed_step: Option<usize>,
    /// Failure detail, if any.
    pub reason: Option<String>,
}

/// Completion callback, invoked exactly once at a terminal status.
pub type TxnCallback = Box<dyn FnOnce(TxnReport) + Send + 'static>;
