//! Backoff policy for bounded retries.
//!
//! [`BackoffPolicy`] controls how retry delays grow after repeated failures.
//! It is used by the batch writer's flush retries and by the orchestrator's
//! restart cooldown. The delay for attempt `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`. The base delay derives purely from
//! the attempt number, so a computed delay never feeds back into subsequent
//! calculations.

use std::time::Duration;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
}

impl Default for BackoffPolicy {
    /// `first = 100ms`, `max = 30s`, `factor = 2.0` (exponential).
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Fixed delay regardless of attempt number.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
        }
    }

    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to
    /// [`BackoffPolicy::max`]. Non-finite or negative intermediate values
    /// clamp to `max` as well.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_zero_returns_first() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn exponential_growth() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
        };
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
        };
        assert_eq!(policy.next(20), Duration::from_secs(1));
    }

    #[test]
    fn constant_policy_never_grows() {
        let policy = BackoffPolicy::constant(Duration::from_millis(250));
        for attempt in 0..8 {
            assert_eq!(policy.next(attempt), Duration::from_millis(250));
        }
    }
}
