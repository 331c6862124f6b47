//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Without an installed recorder the metric calls are no-ops.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when entries are read from the journal.
pub struct EntriesRead {
    pub count: u64,
}

impl InternalEvent for EntriesRead {
    fn emit(self) {
        trace!(count = self.count, "Entries read");
        counter!("journalbeat_entries_read_total").increment(self.count);
    }
}

/// Event emitted when the sink acknowledges a document.
pub struct DocumentDelivered {
    pub duration: Duration,
}

impl InternalEvent for DocumentDelivered {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Document delivered"
        );
        counter!("journalbeat_documents_delivered_total").increment(1);
        histogram!("journalbeat_delivery_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a document is normalized but not sent (dry run).
pub struct DocumentSkipped;

impl InternalEvent for DocumentSkipped {
    fn emit(self) {
        trace!("Document skipped");
        counter!("journalbeat_documents_skipped_total").increment(1);
    }
}

/// Event emitted when a cursor is durably committed.
pub struct CheckpointCommitted {
    pub duration: Duration,
}

impl InternalEvent for CheckpointCommitted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Checkpoint committed"
        );
        counter!("journalbeat_checkpoints_committed_total").increment(1);
        histogram!("journalbeat_checkpoint_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a message was not a JSON object.
pub struct StructuredParseSkipped;

impl InternalEvent for StructuredParseSkipped {
    fn emit(self) {
        trace!("Message is not a JSON object");
        counter!("journalbeat_structured_parse_skipped_total").increment(1);
    }
}

/// Age of the most recently delivered entry, relative to now.
pub struct DeliveryLag {
    pub seconds: f64,
}

impl InternalEvent for DeliveryLag {
    fn emit(self) {
        trace!(seconds = self.seconds, "Delivery lag");
        gauge!("journalbeat_delivery_lag_seconds").set(self.seconds);
    }
}
