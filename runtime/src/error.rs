//! Error types for the ingestion command and the processing worker.
//!
//! Command-level errors are returned to the synchronous caller. Worker-level
//! errors end the run for one file only; per-row validation failures are not
//! errors here at all, they are reported as `RecordProcessed` events.

use bulk_ingest_core::event_publisher::PublishError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the ingestion command.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// No usable file name was supplied.
    #[error("Original file name is required")]
    MissingFileName,

    /// The file name does not carry the `.csv` extension.
    #[error("Only CSV files are allowed: {file_name}")]
    UnsupportedType {
        /// The rejected file name
        file_name: String,
    },

    /// The upload exceeded the configured size limit.
    #[error("File exceeds the {limit} byte upload limit")]
    TooLarge {
        /// Maximum accepted size in bytes
        limit: u64,
    },

    /// Staging the content to local storage failed.
    #[error("Failed to stage upload: {0}")]
    StorageFailure(#[from] std::io::Error),

    /// The content was staged but the `FileIngested` event was not accepted.
    #[error("Failed to publish ingestion event: {0}")]
    PublishFailure(#[from] PublishError),
}

impl IngestionError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingFileName => "missing_file_name",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::TooLarge { .. } => "too_large",
            Self::StorageFailure(_) => "storage_failure",
            Self::PublishFailure(_) => "publish_failure",
        }
    }

    /// Whether the caller sent something unacceptable, as opposed to a
    /// failure on our side.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFileName | Self::UnsupportedType { .. } | Self::TooLarge { .. }
        )
    }
}

/// File-level faults that abort processing of one staged file.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// The staged file does not exist.
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The header line is absent or blank.
    #[error("CSV file has no header: {}", .0.display())]
    MalformedHeader(PathBuf),

    /// Reading the staged file failed part way.
    #[error("Failed to read staged file: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessingError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingFile(_) => "missing_file",
            Self::MalformedHeader(_) => "malformed_header",
            Self::Io(_) => "io",
        }
    }
}
