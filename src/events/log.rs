//! Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] forwards events to `tracing` at the level implied by each
//! event's severity. This is primarily useful for development, demos, and as
//! a reference [`Subscribe`] implementation — production deployments will
//! usually attach their own structured subscriber.

use async_trait::async_trait;

use super::{Event, Severity, Subscribe};

/// Tracing-backed logging subscriber.
///
/// Enabled via the `logging` feature.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let unit = e.unit.as_ref().map(|u| u.as_str().to_string());
        let reason = e.reason.as_deref();
        match e.severity() {
            Severity::Info => tracing::info!(
                seq = e.seq,
                kind = ?e.kind,
                unit = unit.as_deref(),
                reason,
                attempt = e.attempt,
                delay_ms = e.delay_ms,
                phases = ?e.phases,
                "event"
            ),
            Severity::Warning => tracing::warn!(
                seq = e.seq,
                kind = ?e.kind,
                unit = unit.as_deref(),
                reason,
                attempt = e.attempt,
                "event"
            ),
            Severity::Error => tracing::error!(
                seq = e.seq,
                kind = ?e.kind,
                unit = unit.as_deref(),
                reason,
                "event"
            ),
            Severity::Critical => tracing::error!(
                seq = e.seq,
                kind = ?e.kind,
                unit = unit.as_deref(),
                reason,
                count = e.count,
                critical = true,
                "event"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
