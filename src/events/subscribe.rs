//! Subscriber contract for the observation plane.
//!
//! `Subscribe` is the extension point for attaching read-only observers
//! (logging, metrics, a control panel feed) to the [`EventBus`]. Each
//! subscription gets a dedicated bounded queue and worker task, so a slow or
//! panicking subscriber never blocks publishers or its peers.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they do **not** block the
//!   publisher nor other subscribers.
//! - Handlers must never mutate core state; the bus hands out `&Event` only.
//! - A subscriber may declare a preferred queue capacity via
//!   [`Subscribe::queue_capacity`]; the bus default applies otherwise.

use async_trait::async_trait;

use super::Event;

/// Contract for event subscribers.
///
/// Called from a subscription-dedicated worker task. Implementations should
/// avoid blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// `None` uses the bus-wide default from
    /// [`BusConfig::queue_capacity`](super::BusConfig::queue_capacity).
    fn queue_capacity(&self) -> Option<usize> {
        None
    }
}
