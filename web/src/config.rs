//! Configuration management for the ingest server.
//!
//! Loads configuration from environment variables with sensible defaults.

use bulk_ingest_core::record::RecordSchema;
use bulk_ingest_runtime::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Pipeline configuration
    pub ingest: IngestConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory uploads are staged in
    pub upload_dir: PathBuf,
    /// Required-field profile applied to every row
    pub record_schema: RecordSchema,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,
    /// Events buffered per subscriber on the in-process channel
    pub event_channel_capacity: usize,
    /// Retries after a failed row-event publish
    pub publish_max_retries: u32,
    /// Delay before the first publish retry, in milliseconds
    pub publish_initial_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables take their default; unparseable ones are logged and
    /// replaced by the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8080),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                metrics_host: env::var("METRICS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: parse_var("METRICS_PORT", 9090),
                shutdown_timeout: parse_var("SHUTDOWN_TIMEOUT", 30),
            },
            ingest: IngestConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map_or_else(|_| PathBuf::from("uploads"), PathBuf::from),
                record_schema: parse_var("RECORD_SCHEMA", RecordSchema::Minimal),
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
                event_channel_capacity: parse_var("EVENT_CHANNEL_CAPACITY", 1024),
                publish_max_retries: parse_var("PUBLISH_MAX_RETRIES", 3),
                publish_initial_delay_ms: parse_var("PUBLISH_INITIAL_DELAY_MS", 100),
            },
        }
    }
}

impl ServerConfig {
    /// `host:port` the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `host:port` advertised for metrics.
    #[must_use]
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.metrics_host, self.metrics_port)
    }

    /// Graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

impl IngestConfig {
    /// Retry policy for row-event publishes.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.publish_max_retries)
            .initial_delay(Duration::from_millis(self.publish_initial_delay_ms))
            .build()
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            let fallback = &default;
            tracing::warn!(
                variable = name,
                value = raw,
                error = %e,
                default = %fallback,
                "Invalid setting, using default"
            );
            default
        }
    }
}
