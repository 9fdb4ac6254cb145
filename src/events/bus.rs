//! Process-safe publish/subscribe bus for runtime events.
//!
//! [`EventBus`] distributes [`Event`]s to any number of subscribers without
//! blocking the publisher.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │  (rate limiter, per kind)
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → caught, logged
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     │    (bounded)
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` only touches in-memory queues.
//! - **Per-subscriber FIFO**: each subscriber sees its events in publish
//!   order; there is no total order *across* subscribers.
//! - **Bounded queues**: overflow is handled per [`OverflowPolicy`] —
//!   `DropOldest` keeps recency, `RejectNew` keeps continuity.
//! - **Rate limit**: at most `rate_limit` events per kind per second are
//!   admitted, independent of subscriber count; excess is counted and
//!   dropped before fan-out.
//! - **Isolation**: a panicking handler is caught (`catch_unwind`), logged,
//!   and its worker keeps processing the next event.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Notify;

use super::{Event, EventKind, Subscribe};

/// What to do when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room (favors recency).
    DropOldest,
    /// Reject the incoming event (favors continuity of what is queued).
    RejectNew,
}

/// Bus-wide configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Default per-subscription queue capacity (min 1).
    pub queue_capacity: usize,
    /// Overflow policy applied to every subscription queue.
    pub overflow: OverflowPolicy,
    /// Maximum admitted events per [`EventKind`] per second.
    ///
    /// `None` disables rate limiting. The limit applies before fan-out, so
    /// it is independent of how many subscribers are attached.
    pub rate_limit: Option<u32>,
}

impl Default for BusConfig {
    /// `queue_capacity = 1024`, `overflow = DropOldest`, no rate limit.
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            overflow: OverflowPolicy::DropOldest,
            rate_limit: None,
        }
    }
}

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Which events a subscription receives.
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Every published event.
    All,
    /// Only events of the listed kinds.
    Kinds(Vec<EventKind>),
}

impl EventFilter {
    /// Convenience filter for a single kind.
    pub fn kind(kind: EventKind) -> Self {
        EventFilter::Kinds(vec![kind])
    }

    fn matches(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Counters exposed by [`EventBus::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Events admitted past the rate limiter.
    pub published: u64,
    /// Events dropped at a full subscription queue (either policy).
    pub overflowed: u64,
    /// Events rejected by the per-kind rate limiter.
    pub rate_limited: u64,
}

/// Fixed 1-second window state for one event kind.
struct Window {
    start: Instant,
    count: u32,
}

struct SubQueue {
    name: &'static str,
    filter: EventFilter,
    capacity: usize,
    queue: Mutex<VecDeque<Arc<Event>>>,
    notify: Notify,
    closed: AtomicBool,
}

struct BusShared {
    config: BusConfig,
    subs: RwLock<HashMap<u64, Arc<SubQueue>>>,
    next_id: AtomicU64,
    limiter: Mutex<HashMap<EventKind, Window>>,
    published: AtomicU64,
    overflowed: AtomicU64,
    rate_limited: AtomicU64,
}

/// Bounded, rate-limited fan-out bus.
///
/// Cheap to clone; all clones share the same subscriptions and counters.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Creates a bus with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                config,
                subs: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                limiter: Mutex::new(HashMap::new()),
                published: AtomicU64::new(0),
                overflowed: AtomicU64::new(0),
                rate_limited: AtomicU64::new(0),
            }),
        }
    }

    /// Publishes an event to all matching subscriptions.
    ///
    /// Never blocks: the event is enqueued (or dropped per policy) and the
    /// call returns. Events rejected by the rate limiter are counted in
    /// [`BusStats::rate_limited`] and not delivered to anyone.
    pub fn publish(&self, event: Event) {
        if !self.admit(event.kind) {
            self.shared
                .rate_limited
                .fetch_add(1, AtomicOrdering::Relaxed);
            tracing::trace!(kind = ?event.kind, "event dropped by rate limiter");
            return;
        }
        self.shared.published.fetch_add(1, AtomicOrdering::Relaxed);

        let event = Arc::new(event);
        let subs = match self.shared.subs.read() {
            Ok(subs) => subs,
            Err(_) => return,
        };
        for sub in subs.values() {
            if !sub.filter.matches(event.kind) {
                continue;
            }
            self.enqueue(sub, Arc::clone(&event));
        }
    }

    fn enqueue(&self, sub: &SubQueue, event: Arc<Event>) {
        let Ok(mut queue) = sub.queue.lock() else {
            return;
        };
        if queue.len() >= sub.capacity {
            self.shared.overflowed.fetch_add(1, AtomicOrdering::Relaxed);
            match self.shared.config.overflow {
                OverflowPolicy::DropOldest => {
                    queue.pop_front();
                }
                OverflowPolicy::RejectNew => {
                    tracing::warn!(subscriber = sub.name, "subscriber queue full, event rejected");
                    return;
                }
            }
        }
        queue.push_back(event);
        drop(queue);
        sub.notify.notify_one();
    }

    fn admit(&self, kind: EventKind) -> bool {
        let Some(max) = self.shared.config.rate_limit else {
            return true;
        };
        let Ok(mut limiter) = self.shared.limiter.lock() else {
            return true;
        };
        let now = Instant::now();
        let window = limiter.entry(kind).or_insert(Window { start: now, count: 0 });
        if now.duration_since(window.start).as_secs() >= 1 {
            window.start = now;
            window.count = 0;
        }
        if window.count >= max {
            return false;
        }
        window.count += 1;
        true
    }

    /// Attaches a subscriber and spawns its dedicated worker task.
    ///
    /// The worker drains the subscription queue in FIFO order and calls
    /// `handler.on_event` for each event; panics are caught and logged.
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, filter: EventFilter, handler: Arc<dyn Subscribe>) -> SubscriptionId {
        let id = self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let capacity = handler
            .queue_capacity()
            .unwrap_or(self.shared.config.queue_capacity)
            .max(1);
        let sub = Arc::new(SubQueue {
            name: handler.name(),
            filter,
            capacity,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });
        if let Ok(mut subs) = self.shared.subs.write() {
            subs.insert(id, Arc::clone(&sub));
        }

        tokio::spawn(async move {
            loop {
                let next = sub.queue.lock().ok().and_then(|mut q| q.pop_front());
                match next {
                    Some(event) => {
                        let fut = handler.on_event(&event);
                        if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                            let info = panic_message(&panic);
                            tracing::error!(
                                subscriber = handler.name(),
                                panic = %info,
                                "subscriber panicked while handling event"
                            );
                        }
                    }
                    None => {
                        if sub.closed.load(AtomicOrdering::Acquire) {
                            break;
                        }
                        sub.notify.notified().await;
                    }
                }
            }
        });

        SubscriptionId(id)
    }

    /// Detaches a subscription; its worker exits after draining the queue.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self
            .shared
            .subs
            .write()
            .ok()
            .and_then(|mut subs| subs.remove(&id.0));
        if let Some(sub) = removed {
            sub.closed.store(true, AtomicOrdering::Release);
            sub.notify.notify_one();
        }
    }

    /// Detaches all subscriptions (used on shutdown).
    pub fn close(&self) {
        let drained: Vec<Arc<SubQueue>> = match self.shared.subs.write() {
            Ok(mut subs) => subs.drain().map(|(_, sub)| sub).collect(),
            Err(_) => return,
        };
        for sub in drained {
            sub.closed.store(true, AtomicOrdering::Release);
            sub.notify.notify_one();
        }
    }

    /// Snapshot of the bus counters.
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.shared.published.load(AtomicOrdering::Relaxed),
            overflowed: self.shared.overflowed.load(AtomicOrdering::Relaxed),
            rate_limited: self.shared.rate_limited.load(AtomicOrdering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
