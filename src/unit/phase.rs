//! Discrete phase of a unit's acquisition cycle.
//!
//! Phases drive two things in the worker loop:
//! - the adaptive acquisition interval (short while [`Phase::Active`],
//!   long while idle), and
//! - history bookkeeping (a cycle record is appended on the transition
//!   **into** [`Phase::Ended`]).
//!
//! The expected progression per cycle is
//! `Unknown → Waiting → Active → Ended → Waiting → …`, but the worker never
//! enforces it: the phase is whatever the acquisition backend derived, and
//! odd jumps (e.g. `Waiting → Ended`) are handled by the same transition
//! rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived discrete state of a unit's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// No reading has been interpreted yet (startup, or backend confusion).
    Unknown,
    /// The unit is idle between cycles.
    Waiting,
    /// A cycle is in progress; values change quickly.
    Active,
    /// The cycle just completed; terminal for history purposes.
    Ended,
}

impl Phase {
    /// True for the terminal phase that closes a cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Ended)
    }

    /// True while a cycle is in progress (graceful shutdown drains this).
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Active)
    }

    /// Short stable label (snake_case) for logs and events.
    pub fn as_label(self) -> &'static str {
        match self {
            Phase::Unknown => "unknown",
            Phase::Waiting => "waiting",
            Phase::Active => "active",
            Phase::Ended => "ended",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Unknown
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ended_is_terminal() {
        assert!(Phase::Ended.is_terminal());
        for p in [Phase::Unknown, Phase::Waiting, Phase::Active] {
            assert!(!p.is_terminal(), "{p} must not be terminal");
        }
    }

    #[test]
    fn only_active_is_active() {
        assert!(Phase::Active.is_active());
        assert!(!Phase::Ended.is_active());
        assert!(!Phase::Waiting.is_active());
    }
}
