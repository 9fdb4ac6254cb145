//! Per-unit agent coordinator: one active agent at a time.
//!
//! ## Rules
//! - **Mutual exclusion**: a unit has at most one non-paused agent. The
//!   active slot is explicit state, not inferred from gate flags.
//! - **Activation pauses the incumbent**: when agent B activates while A is
//!   active, A is paused and B is resumed under the same lock acquisition.
//!   Any interleaving leaves exactly one agent resumed.
//! - **Fail-fast double activation**: activating the already-active agent
//!   returns [`AgentError::AlreadyActive`] instead of silently continuing.
//! - **Finish restores the displaced agent**: displaced claimants are kept
//!   on a stack, so nested displacement unwinds in reverse order — if C
//!   displaced B displaced A, C's finish resumes B and B's finish resumes A.
//!
//! ### Notes
//! The coordinator holds its `Mutex` only for the duration of a slot update
//! and the gate flips; it never blocks on agent code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::AgentError;
use crate::events::{Event, EventBus, EventKind};
use crate::unit::UnitId;

use super::gate::AgentGate;

/// Who currently owns the unit's active slot.
#[derive(Debug, Clone)]
enum Slot {
    /// No agent is resumed.
    Idle,
    /// `name` is resumed; `displaced` holds every paused claimant, oldest
    /// first, and unwinds as active agents finish.
    Active {
        name: Arc<str>,
        displaced: Vec<Arc<str>>,
    },
}

struct CoordState {
    gates: HashMap<Arc<str>, AgentGate>,
    slot: Slot,
}

/// Enforces the one-active-agent invariant for a single unit.
pub struct AgentCoordinator {
    unit: UnitId,
    bus: EventBus,
    state: Mutex<CoordState>,
}

impl AgentCoordinator {
    /// Creates an idle coordinator for one unit.
    pub fn new(unit: UnitId, bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            unit,
            bus,
            state: Mutex::new(CoordState {
                gates: HashMap::new(),
                slot: Slot::Idle,
            }),
        })
    }

    /// The unit this coordinator belongs to.
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    /// Registers an agent by name and returns its pause-flag receiver.
    ///
    /// Agents start paused; they become runnable only through
    /// [`activate`](Self::activate). Registering a name twice replaces the
    /// old gate, which permanently pauses any agent still watching it.
    pub fn register(&self, name: &str) -> Result<watch::Receiver<bool>, AgentError> {
        let mut state = self.state.lock().map_err(|_| AgentError::Poisoned)?;
        let gate = AgentGate::new();
        let rx = gate.watch();
        state.gates.insert(Arc::from(name), gate);
        Ok(rx)
    }

    /// Makes `name` the active agent, pausing the incumbent first.
    ///
    /// The incumbent keeps its claim: it is pushed onto the displacement
    /// stack and resumed once every agent that displaced it has finished.
    pub fn activate(&self, name: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().map_err(|_| AgentError::Poisoned)?;
        if !state.gates.contains_key(name) {
            return Err(AgentError::Unregistered {
                name: name.to_string(),
            });
        }
        if let Slot::Active { name: cur, .. } = &state.slot {
            if cur.as_ref() == name {
                return Err(AgentError::AlreadyActive {
                    name: name.to_string(),
                });
            }
        }

        let mut displaced = match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Active {
                name: cur,
                mut displaced,
            } => {
                if let Some(gate) = state.gates.get(cur.as_ref()) {
                    gate.pause();
                }
                displaced.push(cur);
                displaced
            }
            Slot::Idle => Vec::new(),
        };
        // A displaced agent re-activating moves back to the top; its stale
        // stack entry would otherwise resume it a second time on unwind.
        displaced.retain(|n| n.as_ref() != name);

        let name: Arc<str> = Arc::from(name);
        if let Some(gate) = state.gates.get(name.as_ref()) {
            gate.resume();
        }
        state.slot = Slot::Active {
            name: Arc::clone(&name),
            displaced,
        };
        drop(state);

        self.bus.publish(
            Event::new(EventKind::AgentActivated)
                .with_unit(self.unit.clone())
                .with_reason(name),
        );
        Ok(())
    }

    /// Ends `name`'s turn and resumes the most recently displaced agent.
    ///
    /// Finishing while not active is a no-op: an agent that was displaced
    /// may still unwind and call `finish` after losing the slot. Displaced
    /// agents whose gates were replaced in the meantime are skipped.
    pub fn finish(&self, name: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().map_err(|_| AgentError::Poisoned)?;
        let (cur, mut displaced) = match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Active { name: cur, displaced } if cur.as_ref() == name => (cur, displaced),
            other => {
                state.slot = other;
                return Ok(());
            }
        };

        if let Some(gate) = state.gates.get(cur.as_ref()) {
            gate.pause();
        }
        state.slot = loop {
            match displaced.pop() {
                Some(prev) => {
                    if let Some(gate) = state.gates.get(prev.as_ref()) {
                        gate.resume();
                        break Slot::Active {
                            name: prev,
                            displaced,
                        };
                    }
                }
                None => break Slot::Idle,
            }
        };
        drop(state);

        self.bus.publish(
            Event::new(EventKind::AgentFinished)
                .with_unit(self.unit.clone())
                .with_reason(cur),
        );
        Ok(())
    }

    /// Name of the currently active agent, if any.
    pub fn active(&self) -> Option<Arc<str>> {
        let state = self.state.lock().ok()?;
        match &state.slot {
            Slot::Active { name, .. } => Some(Arc::clone(name)),
            Slot::Idle => None,
        }
    }

    /// True when the named agent's gate is currently paused.
    pub fn is_paused(&self, name: &str) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.gates.get(name).map(|g| g.is_paused()))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Arc<AgentCoordinator> {
        AgentCoordinator::new(UnitId::from("unit-1"), EventBus::default())
    }

    #[tokio::test]
    async fn activation_pauses_incumbent_and_finish_restores_it() {
        let coord = coordinator();
        coord.register("patrol").unwrap();
        coord.register("repair").unwrap();

        coord.activate("patrol").unwrap();
        assert!(!coord.is_paused("patrol"));

        coord.activate("repair").unwrap();
        assert!(coord.is_paused("patrol"));
        assert!(!coord.is_paused("repair"));
        assert_eq!(coord.active().as_deref(), Some("repair"));

        coord.finish("repair").unwrap();
        assert!(!coord.is_paused("patrol"));
        assert!(coord.is_paused("repair"));
        assert_eq!(coord.active().as_deref(), Some("patrol"));

        coord.finish("patrol").unwrap();
        assert!(coord.active().is_none());
    }

    #[tokio::test]
    async fn double_activation_fails_fast() {
        let coord = coordinator();
        coord.register("patrol").unwrap();
        coord.activate("patrol").unwrap();
        assert!(matches!(
            coord.activate("patrol"),
            Err(AgentError::AlreadyActive { .. })
        ));
        // The failed call must not disturb the slot.
        assert_eq!(coord.active().as_deref(), Some("patrol"));
    }

    #[tokio::test]
    async fn unregistered_activation_is_rejected() {
        let coord = coordinator();
        assert!(matches!(
            coord.activate("ghost"),
            Err(AgentError::Unregistered { .. })
        ));
    }

    #[tokio::test]
    async fn at_most_one_agent_resumed_at_any_point() {
        let coord = coordinator();
        let names = ["a", "b", "c"];
        for name in names {
            coord.register(name).unwrap();
        }

        coord.activate("a").unwrap();
        coord.activate("b").unwrap();
        coord.activate("c").unwrap();

        let resumed: Vec<_> = names.iter().filter(|n| !coord.is_paused(n)).collect();
        assert_eq!(resumed.len(), 1);
        assert_eq!(coord.active().as_deref(), Some("c"));

        // Unwind: c finishes -> b resumes; b finishes -> a resumes; a
        // finishes -> idle. Nothing is left paused with a pending claim.
        coord.finish("c").unwrap();
        assert_eq!(coord.active().as_deref(), Some("b"));
        coord.finish("b").unwrap();
        assert_eq!(coord.active().as_deref(), Some("a"));
        assert!(!coord.is_paused("a"));
        coord.finish("a").unwrap();
        assert!(coord.active().is_none());
    }

    #[tokio::test]
    async fn reactivating_a_displaced_agent_is_not_resumed_twice() {
        let coord = coordinator();
        for name in ["a", "b"] {
            coord.register(name).unwrap();
        }

        // a is displaced by b, then takes the slot back.
        coord.activate("a").unwrap();
        coord.activate("b").unwrap();
        coord.activate("a").unwrap();
        assert_eq!(coord.active().as_deref(), Some("a"));
        assert!(coord.is_paused("b"));

        // Unwind must visit b exactly once, then go idle: a's stale stack
        // entry from the first activation is gone.
        coord.finish("a").unwrap();
        assert_eq!(coord.active().as_deref(), Some("b"));
        coord.finish("b").unwrap();
        assert!(coord.active().is_none());
        assert!(coord.is_paused("a"));
    }

    #[tokio::test]
    async fn finish_of_displaced_agent_is_a_noop() {
        let coord = coordinator();
        coord.register("a").unwrap();
        coord.register("b").unwrap();
        coord.activate("a").unwrap();
        coord.activate("b").unwrap();

        coord.finish("a").unwrap();
        assert_eq!(coord.active().as_deref(), Some("b"));
        assert!(!coord.is_paused("b"));
    }
}
