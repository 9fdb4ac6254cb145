//! Behavior agents: autonomous per-unit behaviors under mutual exclusion.
//!
//! Each unit may carry any number of registered agents, but at most one is
//! *active* (non-paused) at a time. The [`AgentCoordinator`] owns that
//! invariant; agents observe unit state read-only via [`StateAccess`] and
//! act through the transaction controller, typically by evaluating a pure
//! [`DecisionPolicy`] into an [`ActionPlan`].
//!
//! ## Contents
//! - [`Agent`], [`AgentContext`] — the behavior seam
//! - [`AgentCoordinator`] — pause/resume mutual exclusion per unit
//! - [`StateAccess`], [`StateCell`] — read-only state views
//! - [`DecisionPolicy`], [`ActionPlan`], [`PlannedStep`] — pure planning

mod access;
mod agent;
mod coordinator;
mod gate;
mod planner;

pub use access::{StateAccess, StateCell};
pub use agent::{Agent, AgentContext, AgentRef};
pub use coordinator::AgentCoordinator;
pub use planner::{ActionPlan, DecisionPolicy, PlannedStep, PolicyRef};
