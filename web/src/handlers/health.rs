//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the service is up.

use axum::http::StatusCode;

/// Liveness check.
///
/// Returns 200 OK while the process is serving requests. Does not inspect
/// the pipeline.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
