//! Phase-adaptive acquisition cadence.
//!
//! The worker polls fast only while a cycle is in progress. Idle phases use
//! intervals at least 6× the active one, which is where the CPU saving of
//! the whole design comes from: N workers mostly sleep, and only the units
//! with fast-changing values are sampled tightly.

use std::time::Duration;

use crate::unit::Phase;

/// Per-phase acquisition intervals.
///
/// The invariant checked by [`IntervalPolicy::validate`] is that every idle
/// interval is **strictly longer** than the active one; the defaults keep
/// the recommended 6× margin.
#[derive(Debug, Clone, Copy)]
pub struct IntervalPolicy {
    /// Interval while a cycle is in progress (shortest).
    pub active: Duration,
    /// Interval while idle between cycles.
    pub waiting: Duration,
    /// Interval right after a cycle completed.
    pub ended: Duration,
    /// Interval while the phase cannot be derived.
    pub unknown: Duration,
}

impl Default for IntervalPolicy {
    /// `active = 500ms`, idle phases `= 3s` (6× active).
    fn default() -> Self {
        Self {
            active: Duration::from_millis(500),
            waiting: Duration::from_secs(3),
            ended: Duration::from_secs(3),
            unknown: Duration::from_secs(3),
        }
    }
}

impl IntervalPolicy {
    /// Interval to sleep after a cycle observed in `phase`.
    pub fn for_phase(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Active => self.active,
            Phase::Waiting => self.waiting,
            Phase::Ended => self.ended,
            Phase::Unknown => self.unknown,
        }
    }

    /// Checks that idle intervals are strictly longer than the active one.
    ///
    /// Returns a human-readable violation description on failure; the
    /// orchestrator turns it into
    /// [`RuntimeError::InvalidIntervals`](crate::error::RuntimeError::InvalidIntervals)
    /// at registration time.
    pub fn validate(&self) -> Result<(), String> {
        if self.active.is_zero() {
            return Err("active interval must be non-zero".into());
        }
        for (name, idle) in [
            ("waiting", self.waiting),
            ("ended", self.ended),
            ("unknown", self.unknown),
        ] {
            if idle <= self.active {
                return Err(format!(
                    "{name} interval {idle:?} must be strictly longer than active {:?}",
                    self.active
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keeps_six_times_margin() {
        let policy = IntervalPolicy::default();
        assert!(policy.validate().is_ok());
        for phase in [Phase::Waiting, Phase::Ended, Phase::Unknown] {
            assert!(
                policy.for_phase(phase) >= policy.active * 6,
                "{phase} interval must keep the 6x margin"
            );
        }
    }

    #[test]
    fn active_is_strictly_shortest() {
        let policy = IntervalPolicy::default();
        for phase in [Phase::Waiting, Phase::Ended, Phase::Unknown] {
            assert!(policy.for_phase(Phase::Active) < policy.for_phase(phase));
        }
    }

    #[test]
    fn rejects_idle_not_longer_than_active() {
        let policy = IntervalPolicy {
            active: Duration::from_secs(1),
            waiting: Duration::from_secs(1),
            ..IntervalPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn rejects_zero_active() {
        let policy = IntervalPolicy {
            active: Duration::ZERO,
            ..IntervalPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
