//! Behavior agent seam and its execution context.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::events::EventBus;
use crate::txn::TransactionController;
use crate::unit::UnitId;

use super::{AgentCoordinator, StateAccess};

/// Shared handle to a behavior agent.
pub type AgentRef = Arc<dyn Agent>;

/// An autonomous behavior bound to one unit.
///
/// Agents observe state through [`StateAccess`] only and act through the
/// transaction controller; they never touch worker state directly. An agent
/// that wants the active slot calls [`AgentCoordinator::activate`] and must
/// park on [`AgentContext::resumed`] whenever its gate reports paused.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Stable agent name, unique within a unit.
    fn name(&self) -> &str;

    /// Runs until done or cancelled.
    ///
    /// Returning `Err` publishes the failure but does not affect the worker
    /// or other agents; the coordinator restores the displaced agent either
    /// way (the runner calls `finish` on behalf of an agent that forgot to).
    async fn run(&self, ctx: AgentContext) -> Result<(), AgentError>;
}

/// Everything an agent may touch while running.
pub struct AgentContext {
    /// The unit this agent is bound to.
    pub unit: UnitId,
    /// Read-only view of the unit's snapshot and history.
    pub state: Arc<dyn StateAccess>,
    /// Coordinator for activate/finish and mutual exclusion.
    pub coordinator: Arc<AgentCoordinator>,
    /// Controller for submitting planned actions.
    pub txns: TransactionController,
    /// Runtime event bus.
    pub bus: EventBus,
    /// Cancelled when the worker (or runtime) shuts down.
    pub cancel: CancellationToken,
    gate: watch::Receiver<bool>,
}

impl AgentContext {
    pub(crate) fn new(
        unit: UnitId,
        state: Arc<dyn StateAccess>,
        coordinator: Arc<AgentCoordinator>,
        txns: TransactionController,
        bus: EventBus,
        cancel: CancellationToken,
        gate: watch::Receiver<bool>,
    ) -> Self {
        Self {
            unit,
            state,
            coordinator,
            txns,
            bus,
            cancel,
            gate,
        }
    }

    /// True while the coordinator holds this agent paused.
    pub fn is_paused(&self) -> bool {
        *self.gate.borrow()
    }

    /// Waits until this agent is resumed.
    ///
    /// Returns `false` when the runtime is shutting down (cancellation or a
    /// dropped coordinator); the agent should exit its loop in that case.
    pub async fn resumed(&mut self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            res = self.gate.wait_for(|paused| !*paused) => res.is_ok(),
        }
    }
}
