//! Prometheus scrape endpoint.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::State;

/// Render metrics in Prometheus text format.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// 503 when no recorder was installed by this process.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics
        .as_ref()
        .and_then(|server| server.render())
        .ok_or_else(|| AppError::unavailable("Metrics recorder not installed"))
}
