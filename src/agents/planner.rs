//! Stateless decision policies over snapshot + bounded history.
//!
//! A [`DecisionPolicy`] is a pure function: the same snapshot and history
//! slice must always yield the same [`ActionPlan`]. Policies hold no mutable
//! state and perform no I/O, which makes them trivially testable and lets
//! callers replay a decision from recorded inputs.

use std::sync::Arc;

use crate::txn::Step;
use crate::unit::{CycleRecord, StateSnapshot};

/// Shared handle to a decision policy.
pub type PolicyRef = Arc<dyn DecisionPolicy>;

/// Pure decision function producing the next planned actions.
pub trait DecisionPolicy: Send + Sync + 'static {
    /// Decides what to do given the current snapshot and recent history.
    ///
    /// Must be deterministic in its inputs. Return an empty plan for
    /// "nothing to do".
    fn decide(&self, snapshot: &StateSnapshot, history: &[CycleRecord]) -> ActionPlan;
}

impl<F> DecisionPolicy for F
where
    F: Fn(&StateSnapshot, &[CycleRecord]) -> ActionPlan + Send + Sync + 'static,
{
    fn decide(&self, snapshot: &StateSnapshot, history: &[CycleRecord]) -> ActionPlan {
        self(snapshot, history)
    }
}

/// One planned action: a target plus executor-defined parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    /// What the action acts on.
    pub target: Arc<str>,
    /// Executor-defined parameters.
    pub payload: serde_json::Value,
}

impl PlannedStep {
    /// Creates a planned step.
    pub fn new(target: impl Into<Arc<str>>, payload: serde_json::Value) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}

/// Ordered list of planned actions, convertible into transaction steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPlan {
    /// Planned actions in intended execution order.
    pub steps: Vec<PlannedStep>,
}

impl ActionPlan {
    /// A plan with nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the plan carries no actions.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends an action (builder style).
    #[inline]
    pub fn with_step(mut self, step: PlannedStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Converts the plan into transaction steps with default timeout and
    /// retry policy.
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
            .into_iter()
            .map(|p| Step::new(p.target, p.payload))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Phase;
    use serde_json::json;

    fn sample_policy() -> impl DecisionPolicy {
        |snapshot: &StateSnapshot, history: &[CycleRecord]| {
            if snapshot.phase == Phase::Active && history.len() < 2 {
                ActionPlan::empty().with_step(PlannedStep::new("inspect", json!({"depth": 1})))
            } else {
                ActionPlan::empty()
            }
        }
    }

    #[test]
    fn same_inputs_same_plan() {
        let policy = sample_policy();
        let snapshot = StateSnapshot::new(Phase::Active);
        let a = policy.decide(&snapshot, &[]);
        let b = policy.decide(&snapshot, &[]);
        assert_eq!(a, b);
        assert_eq!(a.steps.len(), 1);
    }

    #[test]
    fn empty_plan_converts_to_no_steps() {
        let policy = sample_policy();
        let snapshot = StateSnapshot::new(Phase::Waiting);
        let plan = policy.decide(&snapshot, &[]);
        assert!(plan.is_empty());
        assert!(plan.into_steps().is_empty());
    }

    #[test]
    fn plan_preserves_declared_order() {
        let plan = ActionPlan::empty()
            .with_step(PlannedStep::new("first", json!(1)))
            .with_step(PlannedStep::new("second", json!(2)));
        let steps = plan.into_steps();
        assert_eq!(steps[0].target.as_ref(), "first");
        assert_eq!(steps[1].target.as_ref(), "second");
    }
}
