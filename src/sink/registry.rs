//! Record-kind → shared batch writer registry.
//!
//! The orchestrator receives one registry at startup; every worker routes
//! its records through it. Registration happens before `start_all` —
//! hot-adding writers at runtime is out of scope (restart to reconfigure).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use super::{BatchWriter, Record, RecordKind};

/// Registry of shared batch writers, keyed by record kind.
///
/// Cheap to clone; all clones share the same writer map.
#[derive(Clone, Default)]
pub struct WriterRegistry {
    writers: Arc<RwLock<HashMap<RecordKind, BatchWriter>>>,
}

impl WriterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the writer for its record kind, replacing any previous one.
    pub fn register(&self, writer: BatchWriter) {
        if let Ok(mut writers) = self.writers.write() {
            writers.insert(writer.kind(), writer);
        }
    }

    /// Looks up the writer for a record kind.
    pub fn get(&self, kind: RecordKind) -> Option<BatchWriter> {
        self.writers.read().ok()?.get(&kind).cloned()
    }

    /// Routes a record to the writer registered for its kind.
    ///
    /// Records of an unregistered kind are dropped with a debug log — a
    /// worker may legitimately emit kinds the deployment chose not to
    /// persist.
    pub fn route(&self, record: Record) {
        match self.get(record.kind) {
            Some(writer) => writer.add(record),
            None => {
                tracing::debug!(kind = %record.kind, "no writer registered, record discarded");
            }
        }
    }

    /// Starts every writer's time-threshold ticker.
    pub fn start_tickers(&self, token: &CancellationToken) {
        let writers: Vec<BatchWriter> = match self.writers.read() {
            Ok(writers) => writers.values().cloned().collect(),
            Err(_) => return,
        };
        for writer in writers {
            writer.start_ticker(token.child_token());
        }
    }

    /// Flushes every registered writer exactly once (shutdown path).
    ///
    /// Failures are surfaced by the writers themselves (events + retained
    /// buffers); this method never short-circuits the remaining writers.
    pub async fn flush_all(&self) {
        let writers: Vec<BatchWriter> = match self.writers.read() {
            Ok(writers) => writers.values().cloned().collect(),
            Err(_) => return,
        };
        for writer in writers {
            if let Err(err) = writer.flush().await {
                tracing::error!(kind = %writer.kind(), error = %err, "shutdown flush failed");
            }
        }
    }
}
