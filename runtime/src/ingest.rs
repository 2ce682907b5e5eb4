//! Ingestion command: accept an upload, stage it, announce it.
//!
//! # Flow
//!
//! 1. Reject names without a `.csv` extension (case-insensitive)
//! 2. Generate a fresh identity and stream the content to `<identity>.csv`
//!    in the upload directory
//! 3. Publish a [`FileIngested`] event carrying that identity
//!
//! Staging and publishing are all-or-nothing from the caller's point of view:
//! if either fails, the staged file is removed and an [`IngestionError`] is
//! returned.

use crate::error::IngestionError;
use crate::metrics::{IngestMetrics, PublishMetrics};
use crate::retry::{RetryPolicy, publish_with_retry};
use crate::staging::StagedFileGuard;
use bulk_ingest_core::environment::Clock;
use bulk_ingest_core::event::{DomainEvent, FileIngested};
use bulk_ingest_core::event_publisher::EventPublisher;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Extension accepted by the type gate.
pub const CSV_EXTENSION: &str = "csv";

/// Content type recorded when the uploader supplies none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/csv";

/// Accepts uploads and turns them into staged files plus `FileIngested` events.
pub struct IngestionCommand {
    upload_dir: PathBuf,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    max_upload_bytes: Option<u64>,
}

impl IngestionCommand {
    /// Create a command staging into `upload_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or resolved.
    pub fn new(
        upload_dir: impl AsRef<Path>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(upload_dir.as_ref())?;
        let upload_dir = std::path::absolute(upload_dir.as_ref())?;

        Ok(Self {
            upload_dir,
            publisher,
            clock,
            retry_policy: RetryPolicy::no_retry(),
            max_upload_bytes: None,
        })
    }

    /// Retry the `FileIngested` publish per `policy`.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Refuse uploads larger than `limit` bytes.
    #[must_use]
    pub const fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    /// Directory staged files are written to.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Stage `content` claimed to be `original_file_name` and announce it.
    ///
    /// # Errors
    ///
    /// See [`IngestionCommand::handle_with_content_type`].
    pub async fn handle<R>(
        &self,
        original_file_name: &str,
        content: R,
    ) -> Result<FileIngested, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.handle_with_content_type(original_file_name, None, content).await
    }

    /// Stage `content` and announce it, recording the claimed content type.
    ///
    /// The content reader is consumed and released on every path.
    ///
    /// # Errors
    ///
    /// - [`IngestionError::MissingFileName`] for a blank name
    /// - [`IngestionError::UnsupportedType`] for a non-CSV name; nothing is staged
    /// - [`IngestionError::TooLarge`] if the content exceeds the configured limit
    /// - [`IngestionError::StorageFailure`] if staging I/O fails
    /// - [`IngestionError::PublishFailure`] if the event is not accepted
    pub async fn handle_with_content_type<R>(
        &self,
        original_file_name: &str,
        content_type: Option<&str>,
        content: R,
    ) -> Result<FileIngested, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let result = self.ingest(original_file_name, content_type, content).await;

        match &result {
            Ok(event) => {
                IngestMetrics::record_accepted();
                tracing::info!(
                    aggregate_id = %event.aggregate_id,
                    file_name = %event.original_file_name,
                    file_size = event.file_size,
                    "File accepted for processing"
                );
            }
            Err(e) => {
                IngestMetrics::record_rejected(e.reason());
                if e.is_client_error() {
                    tracing::warn!(file_name = %original_file_name, error = %e, "Upload rejected");
                } else {
                    tracing::error!(file_name = %original_file_name, error = %e, "Upload failed");
                }
            }
        }

        result
    }

    async fn ingest<R>(
        &self,
        original_file_name: &str,
        content_type: Option<&str>,
        content: R,
    ) -> Result<FileIngested, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let file_name = original_file_name.trim();
        if file_name.is_empty() {
            return Err(IngestionError::MissingFileName);
        }
        if !is_csv(file_name) {
            return Err(IngestionError::UnsupportedType {
                file_name: file_name.to_string(),
            });
        }

        let aggregate_id = Uuid::new_v4().to_string();
        let path = self.upload_dir.join(format!("{aggregate_id}.{CSV_EXTENSION}"));
        let guard = StagedFileGuard::new(path.clone());

        match self.announce(aggregate_id, path, file_name, content_type, content).await {
            Ok(event) => {
                guard.disarm();
                Ok(event)
            }
            Err(e) => {
                guard.discard().await;
                Err(e)
            }
        }
    }

    async fn announce<R>(
        &self,
        aggregate_id: String,
        path: PathBuf,
        file_name: &str,
        content_type: Option<&str>,
        content: R,
    ) -> Result<FileIngested, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let file_size = self.stage(&path, content).await?;

        let event = FileIngested::new(
            aggregate_id,
            path,
            file_name,
            content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE),
            file_size,
            self.clock.now(),
        );

        let outgoing = DomainEvent::from(event.clone());
        let event_type = outgoing.event_type();
        let published =
            publish_with_retry(self.publisher.as_ref(), outgoing, &self.retry_policy).await;
        if let Err(e) = published {
            PublishMetrics::record_failed(event_type);
            return Err(e.into());
        }
        PublishMetrics::record_published(event_type);

        Ok(event)
    }

    async fn stage<R>(&self, path: &Path, mut content: R) -> Result<u64, IngestionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut file = File::create(path).await?;

        let written = match self.max_upload_bytes {
            Some(limit) => {
                let mut limited = content.take(limit.saturating_add(1));
                let written = tokio::io::copy(&mut limited, &mut file).await?;
                if written > limit {
                    return Err(IngestionError::TooLarge { limit });
                }
                written
            }
            None => tokio::io::copy(&mut content, &mut file).await?,
        };

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

fn is_csv(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CSV_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_gate_is_case_insensitive() {
        assert!(is_csv("people.csv"));
        assert!(is_csv("PEOPLE.CSV"));
        assert!(is_csv("archive.2024.Csv"));
        assert!(!is_csv("data.txt"));
        assert!(!is_csv("csv"));
        assert!(!is_csv("people.csv.bak"));
    }
}
