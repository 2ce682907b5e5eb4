//! Domain events emitted by the ingest pipeline.
//!
//! Events are immutable facts. Two kinds exist:
//!
//! - [`FileIngested`]: an uploaded file was accepted and staged for processing
//! - [`RecordProcessed`]: one row of a staged file was stored or rejected
//!
//! Every [`RecordProcessed`] carries the `aggregate_id` of the [`FileIngested`]
//! event whose processing produced it, so consumers can correlate row outcomes
//! back to the upload.
//!
//! # Wire Format
//!
//! Events travel as JSON with a `"type"` discriminator and camelCase fields:
//!
//! ```text
//! {"type":"RecordProcessed","eventId":"…","timestamp":"…","aggregateId":"…",
//!  "recordId":null,"status":"FAILURE","errorMessage":"email is required"}
//! ```
//!
//! # Example
//!
//! ```
//! use bulk_ingest_core::event::{DomainEvent, RecordProcessed};
//! use chrono::Utc;
//!
//! let failure = RecordProcessed::failure("file-1", "email is required", Utc::now());
//! let event = DomainEvent::from(failure);
//! assert_eq!(event.event_type(), "RecordProcessed.v1");
//! assert_eq!(event.aggregate_id(), "file-1");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Error types for event encoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to JSON.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from JSON.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// Outcome of processing a single row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// The row validated and its record was stored.
    Success,
    /// The row failed validation and nothing was stored.
    Failure,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Failure => f.write_str("FAILURE"),
        }
    }
}

/// An uploaded file was accepted and staged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIngested {
    /// Unique identifier of this event.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Identity of the staged file; shared by every row event it produces.
    pub aggregate_id: String,
    /// Location of the staged content.
    pub file_path: PathBuf,
    /// File name as claimed by the uploader.
    pub original_file_name: String,
    /// Content type as claimed by the uploader.
    pub content_type: String,
    /// Number of bytes staged.
    pub file_size: u64,
}

impl FileIngested {
    /// Create a new event with a fresh `event_id`.
    #[must_use]
    pub fn new(
        aggregate_id: impl Into<String>,
        file_path: PathBuf,
        original_file_name: impl Into<String>,
        content_type: impl Into<String>,
        file_size: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            aggregate_id: aggregate_id.into(),
            file_path,
            original_file_name: original_file_name.into(),
            content_type: content_type.into(),
            file_size,
        }
    }
}

/// One row of a staged file was processed.
///
/// `record_id` is set iff `status` is [`ProcessingStatus::Success`];
/// `error_message` is set iff `status` is [`ProcessingStatus::Failure`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordProcessed {
    /// Unique identifier of this event.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Identity of the file this row came from.
    pub aggregate_id: String,
    /// Identity of the stored record, if one was created.
    pub record_id: Option<Uuid>,
    /// Row outcome.
    pub status: ProcessingStatus,
    /// Validation failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RecordProcessed {
    /// A row was stored as `record_id`.
    #[must_use]
    pub fn success(
        aggregate_id: impl Into<String>,
        record_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            aggregate_id: aggregate_id.into(),
            record_id: Some(record_id),
            status: ProcessingStatus::Success,
            error_message: None,
        }
    }

    /// A row was rejected.
    #[must_use]
    pub fn failure(
        aggregate_id: impl Into<String>,
        error_message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            aggregate_id: aggregate_id.into(),
            record_id: None,
            status: ProcessingStatus::Failure,
            error_message: Some(error_message.into()),
        }
    }

    /// Whether the row was stored.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }
}

/// Closed set of events the pipeline emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// See [`FileIngested`].
    FileIngested(FileIngested),
    /// See [`RecordProcessed`].
    RecordProcessed(RecordProcessed),
}

impl DomainEvent {
    /// Stable, versioned identifier of the event kind.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::FileIngested(_) => "FileIngested.v1",
            Self::RecordProcessed(_) => "RecordProcessed.v1",
        }
    }

    /// Unique identifier of this event.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        match self {
            Self::FileIngested(e) => e.event_id,
            Self::RecordProcessed(e) => e.event_id,
        }
    }

    /// When the event was created.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::FileIngested(e) => e.timestamp,
            Self::RecordProcessed(e) => e.timestamp,
        }
    }

    /// Identity the event is correlated under.
    #[must_use]
    pub fn aggregate_id(&self) -> &str {
        match self {
            Self::FileIngested(e) => &e.aggregate_id,
            Self::RecordProcessed(e) => &e.aggregate_id,
        }
    }

    /// Encode as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Decode from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the bytes are not a
    /// known event.
    pub fn from_json(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

impl From<FileIngested> for DomainEvent {
    fn from(event: FileIngested) -> Self {
        Self::FileIngested(event)
    }
}

impl From<RecordProcessed> for DomainEvent {
    fn from(event: RecordProcessed) -> Self {
        Self::RecordProcessed(event)
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {{ event_id: {}, aggregate_id: {} }}",
            self.event_type(),
            self.event_id(),
            self.aggregate_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingested() -> FileIngested {
        FileIngested::new(
            "file-1",
            PathBuf::from("/tmp/uploads/file-1.csv"),
            "people.csv",
            "text/csv",
            42,
            Utc::now(),
        )
    }

    #[test]
    fn event_ids_are_fresh() {
        let a = ingested();
        let b = ingested();
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn row_events_share_the_file_aggregate() {
        let file = ingested();
        let ok = RecordProcessed::success(&file.aggregate_id, Uuid::new_v4(), Utc::now());
        let bad = RecordProcessed::failure(&file.aggregate_id, "email is required", Utc::now());

        assert_eq!(ok.aggregate_id, file.aggregate_id);
        assert_eq!(bad.aggregate_id, file.aggregate_id);
        assert!(ok.record_id.is_some() && ok.error_message.is_none());
        assert!(bad.record_id.is_none() && bad.error_message.is_some());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn wire_format_carries_discriminator() {
        let event =
            DomainEvent::from(RecordProcessed::failure("file-1", "email is required", Utc::now()));
        let json: serde_json::Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "RecordProcessed");
        assert_eq!(json["aggregateId"], "file-1");
        assert_eq!(json["status"], "FAILURE");
        assert_eq!(json["errorMessage"], "email is required");
        assert!(json["recordId"].is_null());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn success_omits_error_message() {
        let event =
            DomainEvent::from(RecordProcessed::success("file-1", Uuid::new_v4(), Utc::now()));
        let json: serde_json::Value = serde_json::from_slice(&event.to_json().unwrap()).unwrap();

        assert_eq!(json["status"], "SUCCESS");
        assert!(json.get("errorMessage").is_none());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn decodes_file_ingested() {
        let event = DomainEvent::from(ingested());
        let decoded = DomainEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.event_type(), "FileIngested.v1");
    }

    #[test]
    fn rejects_unknown_discriminator() {
        let err = DomainEvent::from_json(br#"{"type":"FileDeleted","aggregateId":"x"}"#);
        assert!(matches!(err, Err(EventError::DeserializationError(_))));
    }
}
