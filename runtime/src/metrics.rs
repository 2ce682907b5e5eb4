//! Prometheus metrics for the ingest pipeline.
//!
//! Covers the ingestion command (accepted/rejected uploads), the processing
//! worker (rows stored/rejected, aborted files, duration) and event
//! publishing.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulk_ingest_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Rendered text is served by the web layer at /metrics
//! let _text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the handle used to render it.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests) this logs a warning
    /// and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the metrics endpoint is advertised on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("ingest_files_accepted_total", "Uploads staged and announced");
    describe_counter!("ingest_files_rejected_total", "Uploads refused by the ingestion command");
    describe_counter!("ingest_files_processed_total", "Staged files processed to completion");
    describe_counter!("ingest_files_aborted_total", "Staged files abandoned on a file-level fault");
    describe_counter!("ingest_rows_stored_total", "Rows validated and stored");
    describe_counter!("ingest_rows_rejected_total", "Rows that failed validation");
    describe_counter!("ingest_events_published_total", "Events accepted by the publisher");
    describe_counter!(
        "ingest_events_publish_failed_total",
        "Events lost after exhausting publish retries"
    );
    describe_histogram!(
        "ingest_file_processing_duration_seconds",
        "Time taken to process one staged file"
    );
}

/// Ingestion command metrics recorder.
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record an accepted upload.
    pub fn record_accepted() {
        counter!("ingest_files_accepted_total").increment(1);
    }

    /// Record a refused upload.
    pub fn record_rejected(reason: &'static str) {
        counter!("ingest_files_rejected_total", "reason" => reason).increment(1);
    }
}

/// Processing worker metrics recorder.
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Record a completed file.
    pub fn record_processed(duration: Duration) {
        counter!("ingest_files_processed_total").increment(1);
        histogram!("ingest_file_processing_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an aborted file.
    pub fn record_aborted(reason: &'static str) {
        counter!("ingest_files_aborted_total", "reason" => reason).increment(1);
    }

    /// Record a stored row.
    pub fn record_stored() {
        counter!("ingest_rows_stored_total").increment(1);
    }

    /// Record a rejected row.
    pub fn record_rejected() {
        counter!("ingest_rows_rejected_total").increment(1);
    }
}

/// Event publishing metrics recorder.
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record a delivered event.
    pub fn record_published(event_type: &'static str) {
        counter!("ingest_events_published_total", "type" => event_type).increment(1);
    }

    /// Record an event lost after retries.
    pub fn record_failed(event_type: &'static str) {
        counter!("ingest_events_publish_failed_total", "type" => event_type).increment(1);
    }
}
