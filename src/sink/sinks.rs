//! Persistence sink contract and the in-memory reference sink.
//!
//! The core assumes, but does not implement, the durability of the chosen
//! sink; anything that can write a batch of [`Record`]s — a SQL pool, an
//! append-only file, a remote collector — plugs in here.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SinkError;

use super::Record;

/// Shared handle to a persistence sink.
pub type SinkRef = Arc<dyn RecordSink>;

/// Opaque batch persistence sink.
///
/// Must support concurrent calls from distinct [`BatchWriter`](super::BatchWriter)
/// instances without cross-corruption.
#[async_trait]
pub trait RecordSink: Send + Sync + 'static {
    /// Persists one batch. The batch is never empty.
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError>;
}

/// In-memory sink retaining every flushed batch.
///
/// Reference implementation for demos and tests; not a durable store.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Record>>>,
}

impl MemorySink {
    /// Creates an empty sink behind a shared handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of flushes observed.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Total records across all flushed batches.
    pub fn record_count(&self) -> usize {
        self.batches
            .lock()
            .map(|b| b.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Clones the flushed batches, oldest first.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError> {
        let mut batches = self.batches.lock().map_err(|_| SinkError::Unavailable {
            reason: "memory sink mutex poisoned".into(),
        })?;
        batches.push(records.to_vec());
        Ok(())
    }
}
