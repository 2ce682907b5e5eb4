//! HTTP tests driving the router in-process.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use bulk_ingest_core::event_publisher::EventPublisher;
use bulk_ingest_core::record::RecordSchema;
use bulk_ingest_runtime::ingest::IngestionCommand;
use bulk_ingest_runtime::query::RecordQuery;
use bulk_ingest_runtime::record_store::InMemoryRecordStore;
use bulk_ingest_runtime::retry::RetryPolicy;
use bulk_ingest_runtime::worker::ProcessingWorker;
use bulk_ingest_testing::{RecordingEventPublisher, test_clock};
use bulk_ingest_web::{AppState, metrics_router, router};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "X-BULK-INGEST-BOUNDARY";

struct TestApp {
    _dir: TempDir,
    state: AppState,
    store: Arc<InMemoryRecordStore>,
    publisher: Arc<RecordingEventPublisher>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_publisher(RecordingEventPublisher::new())
    }

    fn with_publisher(publisher: RecordingEventPublisher) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryRecordStore::new());
        let publisher = Arc::new(publisher);
        let dyn_publisher: Arc<dyn EventPublisher> = publisher.clone();
        let command = IngestionCommand::new(dir.path(), dyn_publisher, Arc::new(test_clock()))
            .unwrap()
            .with_max_upload_bytes(1024);
        let state = AppState::new(Arc::new(command), RecordQuery::new(store.clone()))
            .with_max_upload_bytes(1024);

        Self {
            _dir: dir,
            state,
            store,
            publisher,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        router(self.state.clone()).oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(&self, file_name: &str, contents: &str) -> Response {
        self.send(multipart_request(Some(file_name), contents)).await
    }

    /// Run the staged file of the last upload through a worker.
    async fn process_last_upload(&self) {
        let event = self.publisher.file_events().pop().unwrap();
        let worker = ProcessingWorker::new(
            self.store.clone(),
            self.publisher.clone(),
            Arc::new(test_clock()),
            RecordSchema::Minimal,
        )
        .with_retry_policy(RetryPolicy::no_retry());
        worker.process(&event).await;
    }
}

fn multipart_request(file_name: Option<&str>, contents: &str) -> Request<Body> {
    let body = format!("{}{contents}\r\n--{BOUNDARY}--\r\n", part_head(file_name));
    upload_request(body)
}

fn part_head(file_name: Option<&str>) -> String {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"file\"; filename=\"{name}\""),
        None => "form-data; name=\"note\"".to_string(),
    };
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\nContent-Type: text/csv\r\n\r\n"
    )
}

fn upload_request(body: String) -> Request<Body> {
    Request::post("/api/v1/records/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_upload_is_accepted() {
    let app = TestApp::new();
    let response = app
        .upload("people.csv", "firstName,lastName,email\nJohn,Doe,john@example.com")
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert_eq!(body["message"], "File uploaded successfully");

    let events = app.publisher.file_events();
    assert_eq!(events.len(), 1);
    assert_eq!(body["fileId"], events[0].aggregate_id.as_str());
    assert_eq!(events[0].original_file_name, "people.csv");
    assert_eq!(events[0].content_type, "text/csv");
}

#[tokio::test]
async fn test_upload_rejects_non_csv() {
    let app = TestApp::new();
    let response = app.upload("data.txt", "a,b").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(app.publisher.events().is_empty());
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let app = TestApp::new();
    let response = app.send(multipart_request(None, "hello")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["message"], "No file uploaded or filename missing");
}

#[tokio::test]
async fn test_upload_over_limit() {
    let app = TestApp::new();
    let big = format!("firstName,lastName,email\n{}", "A,B,a@b.c\n".repeat(200));
    let response = app.upload("big.csv", &big).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.publisher.events().is_empty());
}

#[tokio::test]
async fn test_truncated_upload_is_bad_request_and_not_staged() {
    let app = TestApp::new();
    let body = format!("{}firstName,lastName,email\nA,B,a@b.c\n", part_head(Some("cut.csv")));

    let response = app.send(upload_request(body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["code"], "BAD_REQUEST");
    assert!(app.publisher.events().is_empty());
    assert_eq!(std::fs::read_dir(app.state.command.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_publish_failure_is_unavailable() {
    let app = TestApp::with_publisher(RecordingEventPublisher::rejecting());
    let response = app.upload("people.csv", "firstName,lastName,email").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_uploaded_rows_become_queryable() {
    let app = TestApp::new();
    let response = app
        .upload(
            "people.csv",
            "firstName,lastName,email\nJohn,Doe,john@example.com\nInvalid,Row,",
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    app.process_last_upload().await;

    let all = json(app.get("/api/v1/records").await).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let by_email = app.get("/api/v1/records/email/john@example.com").await;
    assert_eq!(by_email.status(), StatusCode::OK);
    let record = json(by_email).await;
    assert_eq!(record["firstName"], "John");
    assert_eq!(record["lastName"], "Doe");
    assert_eq!(record["email"], "john@example.com");
    assert!(record.get("createdAt").is_some());

    let id = record["id"].as_str().unwrap();
    let by_id = json(app.get(&format!("/api/v1/records/{id}")).await).await;
    assert_eq!(by_id, record);
}

#[tokio::test]
async fn test_unknown_records_are_not_found() {
    let app = TestApp::new();

    let response = app
        .get(&format!("/api/v1/records/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/api/v1/records/email/nobody@example.com").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = TestApp::new();
    let response = app.get("/api/v1/records/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_unavailable_without_recorder() {
    let app = TestApp::new();
    let request = Request::get("/metrics").body(Body::empty()).unwrap();

    let response = metrics_router(app.state.clone()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_not_served_on_api_router() {
    let app = TestApp::new();
    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
