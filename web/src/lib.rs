//! Axum HTTP surface for the bulk ingest pipeline.
//!
//! Thin shell over the runtime: handlers parse requests, call the
//! ingestion command or the query facade, and map results to HTTP.
//!
//! # Routes
//!
//! ```text
//! POST /api/v1/records/upload         multipart CSV upload  → 202 {message, fileId}
//! GET  /api/v1/records                all records
//! GET  /api/v1/records/:id            one record            → 404 when absent
//! GET  /api/v1/records/email/:email   record by email       → 404 when absent
//! GET  /health                        liveness
//! ```
//!
//! Prometheus text is served by [`metrics_router`] on its own listener:
//!
//! ```text
//! GET  /metrics                       Prometheus text   → 503 without a recorder
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

// Re-export key types for convenience
pub use config::Config;
pub use error::AppError;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    let records = Router::new()
        .route(
            "/upload",
            post(handlers::records::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/", get(handlers::records::list_records))
        .route("/email/:email", get(handlers::records::get_record_by_email))
        .route("/:id", get(handlers::records::get_record));

    Router::new()
        .nest("/api/v1/records", records)
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the router for the metrics listener.
#[must_use]
pub fn metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::render_metrics))
        .with_state(state)
}
