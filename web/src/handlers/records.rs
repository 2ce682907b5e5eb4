//! Record endpoints: upload a CSV file, read stored records.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use bulk_ingest_core::record::Record;
use bulk_ingest_runtime::error::IngestionError;
use futures::TryStreamExt;
use serde::Serialize;
use std::io;
use tokio_util::io::StreamReader;
use uuid::Uuid;

/// Body of a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Human-readable acknowledgement
    pub message: String,
    /// Identity of the staged file; row events carry it as `aggregateId`
    pub file_id: String,
}

/// Accept a CSV upload for asynchronous processing.
///
/// The first multipart part that carries a file name is ingested; other
/// parts are ignored. The part is streamed to staging as it arrives, so the
/// upload size cap applies to the network stream.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/records/upload
/// Content-Type: multipart/form-data
/// ```
///
/// # Response
///
/// ```json
/// { "message": "File uploaded successfully", "fileId": "…" }
/// ```
///
/// # Errors
///
/// - 400 when no file part is present, the name is not `.csv`, the file is too
///   large, or the multipart body is cut short
/// - 500 when the file cannot be staged
/// - 503 when the upload cannot be queued
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let content = StreamReader::new(field.map_err(io::Error::other));
        tokio::pin!(content);

        let event = state
            .command
            .handle_with_content_type(&file_name, content_type.as_deref(), content)
            .await
            .map_err(upload_error)?;

        return Ok((
            StatusCode::ACCEPTED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                file_id: event.aggregate_id,
            }),
        ));
    }

    Err(AppError::bad_request("No file uploaded or filename missing"))
}

fn multipart_error(err: &MultipartError) -> AppError {
    AppError::bad_request(format!("Invalid upload: {}", err.body_text()))
}

/// A broken multipart stream surfaces as a staging I/O error and maps to 400.
fn upload_error(err: IngestionError) -> AppError {
    if let IngestionError::StorageFailure(source) = &err {
        let multipart = source
            .get_ref()
            .and_then(|e| e.downcast_ref::<MultipartError>());
        if let Some(multipart) = multipart {
            return multipart_error(multipart);
        }
    }
    err.into()
}

/// List every stored record.
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/records
/// ```
#[allow(clippy::unused_async)]
pub async fn list_records(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.query.get_all())
}

/// Fetch one record by identity.
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/records/:id
/// ```
///
/// # Errors
///
/// 400 for a malformed id, 404 when no record has it.
#[allow(clippy::unused_async)]
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<Record>> {
    let parsed = Uuid::parse_str(&id)
        .map_err(|_| AppError::bad_request(format!("Invalid record id: {id}")))?;

    state
        .query
        .get_by_id(parsed)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Record", id))
}

/// Fetch the record the email index points at.
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/records/email/:email
/// ```
///
/// # Errors
///
/// 404 when no record carries the email.
#[allow(clippy::unused_async)]
pub async fn get_record_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> WebResult<Json<Record>> {
    state
        .query
        .get_by_email(&email)
        .map(Json)
        .ok_or_else(|| AppError::not_found("Record with email", email))
}
