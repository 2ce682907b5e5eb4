//! Bulk ingest HTTP server.
//!
//! Wires the in-memory pipeline together: uploads are staged by the
//! ingestion command, queued on an in-process channel, and processed by a
//! dispatcher-driven worker while the HTTP layer serves queries. Prometheus
//! metrics are served on a separate listener.

use bulk_ingest_core::environment::SystemClock;
use bulk_ingest_runtime::channel::{ChannelEventPublisher, Dispatcher};
use bulk_ingest_runtime::ingest::IngestionCommand;
use bulk_ingest_runtime::metrics::MetricsServer;
use bulk_ingest_runtime::query::RecordQuery;
use bulk_ingest_runtime::record_store::InMemoryRecordStore;
use bulk_ingest_runtime::worker::ProcessingWorker;
use bulk_ingest_web::{AppState, Config, metrics_router, router};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.server.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        schema = %config.ingest.record_schema,
        max_upload_bytes = config.ingest.max_upload_bytes,
        "Starting bulk ingest server"
    );

    let mut metrics_server = MetricsServer::new(config.server.metrics_address().parse()?);
    metrics_server.start()?;
    let metrics_server = Arc::new(metrics_server);

    let store = Arc::new(InMemoryRecordStore::new());
    let (publisher, queue) = ChannelEventPublisher::new(config.ingest.event_channel_capacity);
    let publisher = Arc::new(publisher);
    let clock = Arc::new(SystemClock);

    let worker = ProcessingWorker::new(
        store.clone(),
        publisher.clone(),
        clock.clone(),
        config.ingest.record_schema,
    )
    .with_retry_policy(config.ingest.retry_policy());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let dispatcher =
        Dispatcher::new(Arc::new(worker), queue).with_outcome_log(publisher.subscribe());
    let dispatcher_handle = tokio::spawn(dispatcher.run(async move {
        let _ = shutdown_rx.changed().await;
    }));

    let command = IngestionCommand::new(&config.ingest.upload_dir, publisher, clock)?
        .with_max_upload_bytes(config.ingest.max_upload_bytes);
    info!(upload_dir = %command.upload_dir().display(), "Staging uploads");

    let metrics_addr = metrics_server.addr();
    let state = AppState::new(Arc::new(command), RecordQuery::new(store))
        .with_metrics(metrics_server)
        .with_max_upload_bytes(config.ingest.max_upload_bytes);

    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    info!(address = %metrics_addr, "Metrics listening");
    let metrics_app = metrics_router(state.clone());
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            warn!(error = %e, "Metrics server stopped");
        }
    });

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining in-flight files");
    metrics_handle.abort();
    let _ = shutdown_tx.send(true);

    if tokio::time::timeout(config.server.shutdown_timeout(), dispatcher_handle)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Dispatcher did not stop in time"
        );
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        }
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        }
    }
}
