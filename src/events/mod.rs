//! Runtime events: data model, bus, and subscriber contract.
//!
//! This module groups the event **data model** ([`Event`], [`EventKind`],
//! [`Severity`]), the **bus** used to publish/subscribe ([`EventBus`]), and
//! the **subscriber contract** ([`Subscribe`]) for the observation plane.
//!
//! ## Quick reference
//! - **Publishers**: unit workers (phase transitions, miss streaks), batch
//!   writers (flush failures, drops), the transaction controller (terminal
//!   statuses), and the orchestrator (lifecycle, shutdown).
//! - **Consumers**: anything implementing [`Subscribe`] — log writers,
//!   metrics, control-panel feeds. Consumers are read-only by contract.

mod bus;
mod event;
#[cfg(feature = "logging")]
mod log;
mod subscribe;

pub use bus::{BusConfig, BusStats, EventBus, EventFilter, OverflowPolicy, SubscriptionId};
pub use event::{Event, EventKind, Severity};
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
