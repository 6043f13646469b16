//! Metrics instrumentation for usage-dns.
//!
//! All metrics are prefixed with `usage_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a handled DNS query.
pub fn record_query(outcome: QueryOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        QueryOutcome::Answered => "answered",
        QueryOutcome::Malformed => "malformed",
        QueryOutcome::NotFound => "not_found",
        QueryOutcome::UpstreamError => "upstream_error",
        QueryOutcome::Error => "error",
    };

    counter!("usage_dns.query.count", "outcome" => outcome_str).increment(1);
    histogram!("usage_dns.query.duration.seconds", "outcome" => outcome_str)
        .record(duration.as_secs_f64());
}

/// Query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryOutcome {
    /// Query answered with a PTR record.
    Answered,
    /// Query name did not match the encoding scheme.
    Malformed,
    /// Project unknown or without releases.
    NotFound,
    /// Registry unreachable or erroring.
    UpstreamError,
    /// Request could not be parsed or the response could not be built.
    Error,
}

/// Record a tracking event accepted into the pending buffer.
pub fn record_event_enqueued() {
    counter!("usage_dns.events.enqueued.count").increment(1);
}

/// Record a tracking event dropped because the buffer was full.
pub fn record_event_dropped() {
    counter!("usage_dns.events.dropped.count").increment(1);
}

/// Record the current pending buffer size.
pub fn record_pending_events(count: usize) {
    gauge!("usage_dns.events.pending").set(count as f64);
}

/// Record a batch flush.
pub fn record_flush(events: usize, outcome: FlushOutcome) {
    let outcome_str = match outcome {
        FlushOutcome::Delivered => "delivered",
        FlushOutcome::Dropped => "dropped",
    };

    counter!("usage_dns.flush.count", "outcome" => outcome_str).increment(1);
    histogram!("usage_dns.flush.batch_size", "outcome" => outcome_str).record(events as f64);
}

/// Batch flush outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum FlushOutcome {
    /// Batch delivered to the analytics backend.
    Delivered,
    /// Delivery failed; batch dropped.
    Dropped,
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
