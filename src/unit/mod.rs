//! Per-unit state: identifiers, phases, snapshots, and bounded history.
//!
//! A *unit* is one independently tracked external entity. Each unit owns
//! exactly one supervised worker, and everything in this module is owned by
//! that worker — nothing here is shared mutably across unit boundaries.
//!
//! ## Contents
//! - [`UnitId`] — cheap-to-clone unit identifier
//! - [`Phase`] — discrete derived state of an acquisition cycle
//! - [`StateSnapshot`] — the most recently acquired reading
//! - [`CycleRecord`], [`BoundedHistory`] — completed-cycle ring buffer

mod history;
mod phase;
mod snapshot;

pub use history::{BoundedHistory, CycleRecord, DEFAULT_HISTORY_CAPACITY};
pub use phase::Phase;
pub use snapshot::StateSnapshot;

use std::fmt;
use std::sync::Arc;

/// Identifier of one tracked unit.
///
/// Internally an `Arc<str>`, so clones are cheap and ids can be embedded in
/// events, records, and map keys without copying the string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(Arc<str>);

impl UnitId {
    /// Creates a unit id from any string-like value.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl serde::Serialize for UnitId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for UnitId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}
