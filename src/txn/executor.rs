//! Action-execution seam for transaction steps.

use std::sync::Arc;

use async_trait::async_trait;

use crate::unit::UnitId;

use super::Step;

/// Shared handle to an action executor.
pub type ExecutorRef = Arc<dyn StepExecutor>;

/// External collaborator that applies and reverts transaction steps.
///
/// The controller guarantees `rollback` is only ever called for steps whose
/// `apply` previously returned `Ok`, in reverse application order.
/// Implementations decide what a step's `target`/`payload` mean.
#[async_trait]
pub trait StepExecutor: Send + Sync + 'static {
    /// Applies one step for the given unit.
    async fn apply(&self, unit: &UnitId, step: &Step) -> anyhow::Result<()>;

    /// Reverts the effect of a previously applied step.
    ///
    /// A rollback failure cannot be recovered by the controller; it is
    /// logged and the transaction still terminates as failed.
    async fn rollback(&self, unit: &UnitId, step: &Step) -> anyhow::Result<()>;
}
