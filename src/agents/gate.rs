//! Pause/resume gate shared between the coordinator and one agent.
//!
//! A gate is a `watch` channel carrying a single boolean: `true` means the
//! agent is paused. The coordinator holds the sender; the agent holds a
//! receiver and parks on it between work items. Flipping the flag is a
//! synchronous `send_replace`, so pause/resume pairs performed under the
//! coordinator lock are observed atomically relative to each other.

use tokio::sync::watch;

/// Coordinator-side handle for pausing and resuming one agent.
#[derive(Debug)]
pub(crate) struct AgentGate {
    tx: watch::Sender<bool>,
}

impl AgentGate {
    /// Creates a gate; agents start paused until activated.
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }

    /// Marks the agent paused. Idempotent.
    pub(crate) fn pause(&self) {
        self.tx.send_replace(true);
    }

    /// Marks the agent resumed. Idempotent.
    pub(crate) fn resume(&self) {
        self.tx.send_replace(false);
    }

    /// Current pause flag.
    pub(crate) fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Agent-side receiver for awaiting resume.
    pub(crate) fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_starts_paused_and_flips() {
        let gate = AgentGate::new();
        let mut rx = gate.watch();
        assert!(gate.is_paused());
        assert!(*rx.borrow());

        gate.resume();
        assert!(!gate.is_paused());
        rx.wait_for(|p| !*p).await.unwrap();

        gate.pause();
        assert!(*rx.borrow_and_update());
    }
}
