//! Application state for Axum handlers.

use bulk_ingest_runtime::ingest::IngestionCommand;
use bulk_ingest_runtime::metrics::MetricsServer;
use bulk_ingest_runtime::query::RecordQuery;
use std::sync::Arc;

/// Headroom over the upload limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Accepts uploads
    pub command: Arc<IngestionCommand>,
    /// Reads stored records
    pub query: RecordQuery,
    /// Renders `/metrics`, when a recorder is installed
    pub metrics: Option<Arc<MetricsServer>>,
    /// Largest request body accepted on the upload route
    pub body_limit: usize,
}

impl AppState {
    /// Create state without a metrics endpoint.
    #[must_use]
    pub fn new(command: Arc<IngestionCommand>, query: RecordQuery) -> Self {
        Self {
            command,
            query,
            metrics: None,
            body_limit: 2 * 1024 * 1024,
        }
    }

    /// Serve metrics from `server`.
    #[must_use]
    pub fn with_metrics(mut self, server: Arc<MetricsServer>) -> Self {
        self.metrics = Some(server);
        self
    }

    /// Size the upload route's body limit for files up to `max_upload_bytes`.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.body_limit = usize::try_from(max_upload_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD);
        self
    }
}
