//! Shared batch writer: buffer records, flush as a single bulk write.
//!
//! One [`BatchWriter`] instance serves **all** workers producing the same
//! [`RecordKind`] — a hard design requirement, not an optimization detail:
//! N units share one buffer and the sink sees few, large writes instead of
//! N trickles.
//!
//! ## Architecture
//! ```text
//!  worker 1 ──┐
//!  worker 2 ──┼── add() ──► [buffer (mutex)] ──► take whole buffer ──► sink.write_batch()
//!  worker N ──┘                 │                (size/time threshold,      (serialized by
//!                               │                 explicit flush)            flush gate)
//!                               └── retained on write failure, capped at max_buffered
//! ```
//!
//! ## Rules
//! - `add()` never performs I/O: it appends under a mutex and, when the size
//!   or time threshold is reached, hands the drained batch to a background
//!   task.
//! - A buffer generation is flushed **exactly once**: the batch is taken
//!   whole under the buffer lock, so concurrent flush callers see disjoint
//!   generations, and an empty take is a no-op.
//! - Sink writes are serialized by an internal async gate; no two writes of
//!   the same writer interleave.
//! - A failed write (after bounded retries) publishes
//!   [`EventKind::FlushFailed`] and puts the batch **back in front of** the
//!   buffer for the next attempt. The retained buffer is capped at
//!   `max_buffered`; beyond that the oldest records are dropped and
//!   [`EventKind::RecordsDropped`] (critical) is published.
//! - Shutdown calls [`BatchWriter::flush`] once per writer, so a buffer
//!   below threshold is not lost on graceful exit.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::SinkError;
use crate::events::{Event, EventBus, EventKind};
use crate::policies::BackoffPolicy;

use super::{Record, RecordKind, SinkRef};

/// Buffering and retry knobs for one writer.
#[derive(Debug, Clone)]
pub struct BatchWriterConfig {
    /// Flush as soon as the buffer reaches this many records.
    pub batch_size: usize,
    /// Flush when the oldest unflushed record is this old.
    pub flush_interval: Duration,
    /// Hard ceiling on retained records after failed flushes.
    pub max_buffered: usize,
    /// Sink write attempts per batch (1 = no retry).
    pub retry_attempts: u32,
    /// Delay growth between retry attempts.
    pub retry_backoff: BackoffPolicy,
}

impl Default for BatchWriterConfig {
    /// `batch_size = 50`, `flush_interval = 5s`, `max_buffered = 10_000`,
    /// 3 attempts with exponential backoff from 100ms.
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
            max_buffered: 10_000,
            retry_attempts: 3,
            retry_backoff: BackoffPolicy::default(),
        }
    }
}

/// Counters exposed by [`BatchWriter::stats`].
///
/// Batch completeness invariant: `added == flushed + pending + dropped`
/// whenever the writer is quiescent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records ever accepted by `add`.
    pub added: u64,
    /// Records successfully written to the sink.
    pub flushed: u64,
    /// Records dropped at the memory ceiling.
    pub dropped: u64,
    /// Records currently buffered.
    pub pending: u64,
    /// Successful sink writes.
    pub flushes: u64,
}

struct Buffer {
    records: Vec<Record>,
    last_flush: Instant,
    generation: u64,
}

struct WriterShared {
    kind: RecordKind,
    config: BatchWriterConfig,
    sink: SinkRef,
    bus: EventBus,
    buffer: Mutex<Buffer>,
    /// Serializes sink writes; never held while touching the buffer lock
    /// except through `take_batch`.
    flush_gate: tokio::sync::Mutex<()>,
    added: AtomicU64,
    flushed: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
}

/// Shared-by-record-kind batch writer.
///
/// Cheap to clone; all clones share the same buffer, counters, and sink.
#[derive(Clone)]
pub struct BatchWriter {
    shared: Arc<WriterShared>,
}

impl BatchWriter {
    /// Creates a writer for one record kind in front of the given sink.
    pub fn new(kind: RecordKind, sink: SinkRef, config: BatchWriterConfig, bus: EventBus) -> Self {
        Self {
            shared: Arc::new(WriterShared {
                kind,
                config,
                sink,
                bus,
                buffer: Mutex::new(Buffer {
                    records: Vec::new(),
                    last_flush: Instant::now(),
                    generation: 0,
                }),
                flush_gate: tokio::sync::Mutex::new(()),
                added: AtomicU64::new(0),
                flushed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                flushes: AtomicU64::new(0),
            }),
        }
    }

    /// Record kind served by this writer.
    pub fn kind(&self) -> RecordKind {
        self.shared.kind
    }

    /// Appends a record to the buffer; never performs I/O synchronously.
    ///
    /// When the size or time threshold is reached, the current buffer
    /// generation is drained under the lock and written by a background
    /// task. Must be called from within a tokio runtime.
    pub fn add(&self, record: Record) {
        debug_assert_eq!(record.kind, self.shared.kind, "record routed to wrong writer");
        self.shared.added.fetch_add(1, AtomicOrdering::Relaxed);

        let due = {
            let Ok(mut buffer) = self.shared.buffer.lock() else {
                return;
            };
            buffer.records.push(record);
            buffer.records.len() >= self.shared.config.batch_size
                || buffer.last_flush.elapsed() >= self.shared.config.flush_interval
        };
        if due {
            if let Some(batch) = self.take_batch() {
                let writer = self.clone();
                tokio::spawn(async move {
                    // Failure is surfaced via events and the retained buffer.
                    let _ = writer.write_with_retry(batch).await;
                });
            }
        }
    }

    /// Flushes the current buffer generation as one bulk write.
    ///
    /// Safe to call concurrently from a background ticker and from shutdown
    /// code: the batch is taken whole under the buffer lock, so each
    /// generation is written at most once and an empty buffer is a no-op.
    pub async fn flush(&self) -> Result<(), SinkError> {
        match self.take_batch() {
            Some(batch) => self.write_with_retry(batch).await,
            None => Ok(()),
        }
    }

    /// Spawns the time-threshold ticker; exits when `token` is cancelled.
    pub fn start_ticker(&self, token: CancellationToken) {
        let writer = self.clone();
        tokio::spawn(async move {
            let period = writer.shared.config.flush_interval;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {
                        if writer.time_threshold_due() {
                            let _ = writer.flush().await;
                        }
                    }
                }
            }
        });
    }

    /// Snapshot of the writer counters.
    pub fn stats(&self) -> WriterStats {
        let pending = self
            .shared
            .buffer
            .lock()
            .map(|b| b.records.len() as u64)
            .unwrap_or(0);
        WriterStats {
            added: self.shared.added.load(AtomicOrdering::Relaxed),
            flushed: self.shared.flushed.load(AtomicOrdering::Relaxed),
            dropped: self.shared.dropped.load(AtomicOrdering::Relaxed),
            pending,
            flushes: self.shared.flushes.load(AtomicOrdering::Relaxed),
        }
    }

    fn time_threshold_due(&self) -> bool {
        self.shared
            .buffer
            .lock()
            .map(|b| {
                !b.records.is_empty()
                    && b.last_flush.elapsed() >= self.shared.config.flush_interval
            })
            .unwrap_or(false)
    }

    /// Drains the whole buffer as one generation; `None` when empty.
    fn take_batch(&self) -> Option<Vec<Record>> {
        let Ok(mut buffer) = self.shared.buffer.lock() else {
            return None;
        };
        if buffer.records.is_empty() {
            return None;
        }
        buffer.generation += 1;
        buffer.last_flush = Instant::now();
        Some(std::mem::take(&mut buffer.records))
    }

    async fn write_with_retry(&self, batch: Vec<Record>) -> Result<(), SinkError> {
        let _gate = self.shared.flush_gate.lock().await;
        let attempts = self.shared.config.retry_attempts.max(1);

        let mut attempt = 0;
        loop {
            match self.shared.sink.write_batch(&batch).await {
                Ok(()) => {
                    self.shared
                        .flushed
                        .fetch_add(batch.len() as u64, AtomicOrdering::Relaxed);
                    self.shared.flushes.fetch_add(1, AtomicOrdering::Relaxed);
                    tracing::debug!(
                        kind = %self.shared.kind,
                        records = batch.len(),
                        "batch flushed"
                    );
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.shared.config.retry_backoff.next(attempt);
                    tracing::warn!(
                        kind = %self.shared.kind,
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "flush attempt failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    self.retain(batch);
                    self.shared.bus.publish(
                        Event::new(EventKind::FlushFailed)
                            .with_reason(format!("{}: {err}", self.shared.kind))
                            .with_attempt(attempt + 1),
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Puts a failed batch back in front of the buffer, enforcing the
    /// memory ceiling (oldest records are dropped first).
    fn retain(&self, mut batch: Vec<Record>) {
        let overflow = {
            let Ok(mut buffer) = self.shared.buffer.lock() else {
                return;
            };
            batch.append(&mut buffer.records);
            buffer.records = batch;

            let ceiling = self.shared.config.max_buffered.max(1);
            let len = buffer.records.len();
            if len > ceiling {
                let overflow = len - ceiling;
                buffer.records.drain(..overflow);
                overflow as u64
            } else {
                0
            }
        };
        if overflow > 0 {
            self.shared.dropped.fetch_add(overflow, AtomicOrdering::Relaxed);
            self.shared.bus.publish(
                Event::new(EventKind::RecordsDropped)
                    .with_reason(format!("{} buffer over ceiling", self.shared.kind))
                    .with_count(overflow),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, RecordSink};
    use crate::unit::UnitId;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    const KIND: RecordKind = RecordKind("test");

    fn record(n: u64) -> Record {
        Record::new(KIND, UnitId::new("u1"), serde_json::json!({ "n": n }))
    }

    fn writer(sink: SinkRef, config: BatchWriterConfig) -> BatchWriter {
        BatchWriter::new(KIND, sink, config, EventBus::default())
    }

    /// Sink that fails the first `fail_first` write calls.
    struct FlakySink {
        inner: MemorySink,
        fail_first: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RecordSink for FlakySink {
        async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError> {
            let call = self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if call < self.fail_first {
                return Err(SinkError::Write {
                    reason: "simulated outage".into(),
                });
            }
            self.inner.write_batch(records).await
        }
    }

    #[tokio::test]
    async fn size_threshold_triggers_one_automatic_flush() {
        let sink = MemorySink::shared();
        let writer = writer(
            sink.clone(),
            BatchWriterConfig {
                batch_size: 3,
                flush_interval: Duration::from_secs(3600),
                ..BatchWriterConfig::default()
            },
        );

        for n in 0..5 {
            writer.add(record(n));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.batch_count(), 1, "exactly one automatic flush");
        assert_eq!(sink.record_count(), 3);
        assert_eq!(writer.stats().pending, 2);

        writer.flush().await.unwrap();
        assert_eq!(sink.batch_count(), 2);
        assert_eq!(sink.record_count(), 5);
        assert_eq!(writer.stats().pending, 0);
    }

    #[tokio::test]
    async fn failed_flush_retains_records_for_next_attempt() {
        let sink = Arc::new(FlakySink {
            inner: MemorySink::default(),
            fail_first: 3,
            calls: AtomicU32::new(0),
        });
        let writer = writer(
            sink.clone(),
            BatchWriterConfig {
                batch_size: 100,
                retry_attempts: 3,
                retry_backoff: BackoffPolicy::constant(Duration::from_millis(1)),
                ..BatchWriterConfig::default()
            },
        );

        writer.add(record(1));
        writer.add(record(2));
        let err = writer.flush().await;
        assert!(err.is_err(), "all three attempts fail");
        assert_eq!(writer.stats().pending, 2, "records retained after failure");

        // The sink has recovered; the retained generation flushes whole.
        writer.flush().await.unwrap();
        assert_eq!(sink.inner.record_count(), 2);
        assert_eq!(writer.stats().pending, 0);
    }

    #[tokio::test]
    async fn memory_ceiling_drops_oldest_records() {
        let sink = Arc::new(FlakySink {
            inner: MemorySink::default(),
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let writer = writer(
            sink,
            BatchWriterConfig {
                batch_size: 100,
                max_buffered: 4,
                retry_attempts: 1,
                ..BatchWriterConfig::default()
            },
        );

        for n in 0..6 {
            writer.add(record(n));
        }
        let _ = writer.flush().await;

        let stats = writer.stats();
        assert_eq!(stats.pending, 4, "buffer capped at ceiling");
        assert_eq!(stats.dropped, 2);
    }

    #[tokio::test]
    async fn completeness_added_equals_flushed_plus_pending() {
        let sink = MemorySink::shared();
        let writer = writer(
            sink,
            BatchWriterConfig {
                batch_size: 4,
                flush_interval: Duration::from_secs(3600),
                ..BatchWriterConfig::default()
            },
        );

        for n in 0..10 {
            writer.add(record(n));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = writer.stats();
        assert_eq!(stats.added, 10);
        assert_eq!(stats.added, stats.flushed + stats.pending + stats.dropped);
    }
}
