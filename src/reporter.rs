//! Batched delivery of usage events to the analytics backend.
//!
//! `track` appends to a bounded in-memory buffer and returns immediately; a
//! single background task drains the buffer on a fixed interval and posts
//! each batch in one request. Delivery is best-effort: a failed batch is
//! dropped, never retried, and never affects query handling.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::ProjectVersion;
use crate::config::AnalyticsConfig;
use crate::error::{ServiceError, TrackError};
use crate::metrics::{self, FlushOutcome};

/// One tracked query: the client-reported project/version plus the caller's
/// address (empty when unavailable).
#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    /// Project the client queried for.
    pub project: String,
    /// Version the client reported as installed (or the `latest` sentinel).
    pub version: String,
    /// Client IP in string form.
    pub client_address: String,
}

impl TrackingEvent {
    /// Build an event from a decoded query and the caller's address.
    pub fn new(pv: &ProjectVersion, client_address: impl Into<String>) -> Self {
        Self {
            project: pv.project.clone(),
            version: pv.version.clone(),
            client_address: client_address.into(),
        }
    }
}

/// Destination for event batches.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one batch. No retry contract; the caller drops the batch on
    /// failure.
    async fn submit(&self, batch: &[TrackingEvent]) -> Result<(), TrackError>;
}

/// [`EventSink`] posting batches to a Keen-style collection endpoint.
pub struct HttpEventSink {
    http: reqwest::Client,
    api_url: String,
    project_id: String,
    write_key: String,
    collection: String,
}

impl HttpEventSink {
    /// Build a sink from configuration.
    pub fn new(config: &AnalyticsConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("usage-dns/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            write_key: config.write_key.clone(),
            collection: config.collection.clone(),
        })
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn submit(&self, batch: &[TrackingEvent]) -> Result<(), TrackError> {
        let url = format!("{}/3.0/projects/{}/events", self.api_url, self.project_id);

        // Body shape: { "<collection>": [event, ...] }
        let mut body = serde_json::Map::new();
        body.insert(self.collection.clone(), serde_json::to_value(batch)?);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.write_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Accumulates tracking events and flushes them to an [`EventSink`] on a
/// fixed interval, independent of any query's lifetime.
pub struct UsageReporter {
    sink: Arc<dyn EventSink>,
    pending: Mutex<Vec<TrackingEvent>>,
    max_pending: usize,
    flush_interval: Duration,
}

impl UsageReporter {
    /// Create a reporter flushing to `sink`.
    pub fn new(sink: Arc<dyn EventSink>, flush_interval: Duration, max_pending: usize) -> Self {
        Self {
            sink,
            pending: Mutex::new(Vec::new()),
            max_pending,
            flush_interval,
        }
    }

    /// Append an event to the pending buffer. Returns immediately; the only
    /// failure mode is a full buffer, which is non-fatal to the caller.
    pub fn track(&self, event: TrackingEvent) -> Result<(), TrackError> {
        let mut pending = self.pending.lock();
        if pending.len() >= self.max_pending {
            metrics::record_event_dropped();
            return Err(TrackError::BufferFull {
                capacity: self.max_pending,
            });
        }
        pending.push(event);
        metrics::record_event_enqueued();
        metrics::record_pending_events(pending.len());
        Ok(())
    }

    /// Number of events currently awaiting flush.
    pub fn pending_events(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drain the buffer and deliver its contents as one batch. A delivery
    /// failure drops the batch with a warning.
    pub async fn flush_now(&self) {
        let batch = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return;
        }

        metrics::record_pending_events(0);
        match self.sink.submit(&batch).await {
            Ok(()) => {
                debug!(events = batch.len(), "flushed usage batch");
                metrics::record_flush(batch.len(), FlushOutcome::Delivered);
            }
            Err(e) => {
                warn!(
                    events = batch.len(),
                    error = %e,
                    "failed to deliver usage batch, dropping"
                );
                metrics::record_flush(batch.len(), FlushOutcome::Dropped);
            }
        }
    }

    /// Periodic flush loop. Runs until the token is cancelled, then drains
    /// the buffer one last time.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.flush_interval);
        // The first tick completes immediately; consume it so the loop
        // starts with a full interval of accumulation.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("usage reporter shutting down");
                    self.flush_now().await;
                    return;
                }
                _ = interval.tick() => {
                    self.flush_now().await;
                }
            }
        }
    }
}
