//! Acquisition seam: the external collaborator that produces unit readings,
//! plus the adaptive cadence that drives the worker loop.
//!
//! The core treats acquisition as opaque — optical recognition, template
//! matching, a test stub — anything that can repeatedly turn a
//! [`WorkerConfig`]'s region descriptors into a [`StateSnapshot`].
//!
//! ## Contract
//! - `Ok(Some(snapshot))` — a reading was produced.
//! - `Ok(None)` — nothing recognizable this cycle; the worker skips the
//!   cycle and never fabricates a value.
//! - `Err(_)` — backend failure; treated like a miss (skip, log, continue).
//!
//! Implementations must be safely callable repeatedly and must not share
//! mutable state across unit instances.

mod interval;

pub use interval::IntervalPolicy;

use std::{borrow::Cow, future::Future, sync::Mutex};

use async_trait::async_trait;

use crate::config::WorkerConfig;
use crate::error::AcquireError;
use crate::unit::StateSnapshot;

/// Shared handle to an acquisition backend.
pub type AcquireRef = std::sync::Arc<dyn Acquire>;

/// Asynchronous acquisition backend.
///
/// One instance serves one unit; the worker calls it once per cycle under
/// the configured timeout.
#[async_trait]
pub trait Acquire: Send + Sync + 'static {
    /// Produces the current reading for the unit, or `None` on a miss.
    async fn acquire(&self, config: &WorkerConfig) -> Result<Option<StateSnapshot>, AcquireError>;
}

/// Function-backed acquisition backend.
///
/// Wraps a closure `Fnc: FnMut(&WorkerConfig) -> Fut`. The closure is behind
/// a [`Mutex`] so `acquire(&self, ...)` can be called repeatedly even though
/// the closure is `FnMut`; the lock is held only while *creating* the
/// future, never while awaiting it.
///
/// # Example
/// ```
/// use unitvisor::acquire::{AcquireFn, AcquireRef};
/// use unitvisor::unit::{Phase, StateSnapshot};
///
/// let backend: AcquireRef = AcquireFn::arc("stub", |_config| async {
///     Ok(Some(StateSnapshot::new(Phase::Waiting)))
/// });
/// ```
pub struct AcquireFn<Fnc, Fut>
where
    Fnc: FnMut(&WorkerConfig) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<StateSnapshot>, AcquireError>> + Send + 'static,
{
    name: Cow<'static, str>,
    func: Mutex<Fnc>,
}

impl<Fnc, Fut> AcquireFn<Fnc, Fut>
where
    Fnc: FnMut(&WorkerConfig) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<StateSnapshot>, AcquireError>> + Send + 'static,
{
    /// Creates a new function-backed backend.
    pub fn new(name: impl Into<Cow<'static, str>>, func: Fnc) -> Self {
        Self {
            name: name.into(),
            func: Mutex::new(func),
        }
    }

    /// Creates the backend and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, func: Fnc) -> AcquireRef {
        std::sync::Arc::new(Self::new(name, func))
    }

    /// Backend name (for logs).
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<Fnc, Fut> Acquire for AcquireFn<Fnc, Fut>
where
    Fnc: FnMut(&WorkerConfig) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<StateSnapshot>, AcquireError>> + Send + 'static,
{
    async fn acquire(&self, config: &WorkerConfig) -> Result<Option<StateSnapshot>, AcquireError> {
        let fut = {
            let mut f = self.func.lock().map_err(|_| AcquireError::Backend {
                reason: "acquire closure mutex poisoned".into(),
            })?;
            (f)(config)
        };
        fut.await
    }
}
