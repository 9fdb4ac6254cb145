//! Reusable policy values for retries and cadence.
//!
//! - [`BackoffPolicy`] — delay growth for bounded retries (flush retries,
//!   restart cooldowns).

mod backoff;

pub use backoff::BackoffPolicy;
