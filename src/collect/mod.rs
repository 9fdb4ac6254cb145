//! Collector seam: turn snapshots into persistence records.
//!
//! Collectors run inside the worker loop after every successful acquisition.
//! Each one independently decides whether the current snapshot warrants
//! zero, one, or more [`Record`]s; the worker routes whatever comes back to
//! the shared writer for each record's kind.
//!
//! Collectors are read-only observers of the snapshot — they never mutate
//! worker state and never perform I/O themselves (the batch writers own the
//! I/O path).

use std::sync::Arc;

use crate::sink::Record;
use crate::unit::{StateSnapshot, UnitId};

/// Shared handle to a collector.
pub type CollectorRef = Arc<dyn Collector>;

/// Derives records from a unit snapshot.
pub trait Collector: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &'static str;

    /// Emits records for this cycle's snapshot; an empty vec is the normal
    /// "nothing noteworthy" outcome.
    fn collect(&self, unit: &UnitId, snapshot: &StateSnapshot) -> Vec<Record>;
}

/// Function-backed collector.
pub struct CollectorFn<F>
where
    F: Fn(&UnitId, &StateSnapshot) -> Vec<Record> + Send + Sync + 'static,
{
    name: &'static str,
    func: F,
}

impl<F> CollectorFn<F>
where
    F: Fn(&UnitId, &StateSnapshot) -> Vec<Record> + Send + Sync + 'static,
{
    /// Creates a collector from a plain function.
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }

    /// Creates the collector and returns it as a shared handle.
    pub fn arc(name: &'static str, func: F) -> CollectorRef {
        Arc::new(Self::new(name, func))
    }
}

impl<F> Collector for CollectorFn<F>
where
    F: Fn(&UnitId, &StateSnapshot) -> Vec<Record> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn collect(&self, unit: &UnitId, snapshot: &StateSnapshot) -> Vec<Record> {
        (self.func)(unit, snapshot)
    }
}
