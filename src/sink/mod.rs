//! Batch persistence: records, shared writers, and the sink seam.
//!
//! ## Contents
//! - [`Record`], [`RecordKind`] — immutable collected data and its type tag
//! - [`RecordSink`] — the opaque persistence backend contract
//! - [`BatchWriter`] — shared-by-kind buffering with bounded-retry flushes
//! - [`WriterRegistry`] — kind → writer routing handed to the orchestrator
//! - [`MemorySink`] — in-memory reference sink for demos and tests

mod batch;
mod record;
mod registry;
mod sinks;

pub use batch::{BatchWriter, BatchWriterConfig, WriterStats};
pub use record::{Record, RecordKind};
pub use registry::WriterRegistry;
pub use sinks::{MemorySink, RecordSink, SinkRef};
