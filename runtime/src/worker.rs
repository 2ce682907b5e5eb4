//! Processing worker: turn a staged file into records and row events.
//!
//! # Per-file state machine
//!
//! ```text
//! Start ─► HeaderRead ─► RowLoop { Validating ─► Stored | Rejected } ─► Cleanup ─► Done
//!   │          │                                                          ▲
//!   └──────────┴──── MissingFile / MalformedHeader ───────────────────────┘
//! ```
//!
//! Rows are handled strictly in file order. Each row yields a
//! `Result<Record, ValidationError>`; that outcome is folded into at most one
//! store write and exactly one `RecordProcessed` publish attempt. A bad row
//! never stops the rows after it.
//!
//! # Reading
//!
//! The staged file is parsed as one CSV document on a blocking thread and
//! records reach the row loop through a bounded channel, so quoted fields may
//! span lines. A record that is not valid UTF-8 is rejected as a malformed
//! row.
//!
//! # Publish failures
//!
//! The store write and the event publish for a row are independent outcomes.
//! A publish is retried per the worker's [`RetryPolicy`]; if it still fails the
//! row's store outcome stands, the loss is logged and counted in
//! [`ProcessingReport::unreported`], and no contradicting event is emitted. A
//! stored record is therefore never reported as a failure.
//!
//! # Cleanup
//!
//! The staged file is deleted when processing ends, whatever the outcome.

use crate::error::ProcessingError;
use crate::metrics::{PublishMetrics, WorkerMetrics};
use crate::retry::{RetryPolicy, publish_with_retry};
use crate::staging::StagedFileGuard;
use bulk_ingest_core::environment::Clock;
use bulk_ingest_core::event::{DomainEvent, FileIngested, RecordProcessed};
use bulk_ingest_core::event_publisher::EventPublisher;
use bulk_ingest_core::record::{Record, RecordSchema, Row, ValidationError};
use bulk_ingest_core::record_store::RecordStore;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::sync::mpsc;
use tracing::Instrument;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Records read ahead of the row loop.
const LINE_BUFFER: usize = 64;

/// Summary of one completed file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    /// Identity of the processed file.
    pub aggregate_id: String,
    /// Non-blank data rows seen.
    pub rows: usize,
    /// Rows stored as records.
    pub stored: usize,
    /// Rows rejected by validation.
    pub rejected: usize,
    /// Row events lost after exhausting publish retries.
    pub unreported: usize,
}

/// Consumes `FileIngested` events and materializes their rows.
pub struct ProcessingWorker {
    store: Arc<dyn RecordStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    schema: RecordSchema,
    retry_policy: RetryPolicy,
}

impl ProcessingWorker {
    /// Create a worker validating rows against `schema`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        schema: RecordSchema,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            schema,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Retry row-event publishes per `policy`.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Schema rows are validated against.
    #[must_use]
    pub const fn schema(&self) -> RecordSchema {
        self.schema
    }

    /// Process a staged file. Outcomes are observable only through published
    /// events and the record store; file-level faults are logged.
    pub async fn process(&self, event: &FileIngested) {
        let started = Instant::now();

        match self.process_file(event).await {
            Ok(report) => {
                WorkerMetrics::record_processed(started.elapsed());
                tracing::info!(
                    aggregate_id = %report.aggregate_id,
                    rows = report.rows,
                    stored = report.stored,
                    rejected = report.rejected,
                    unreported = report.unreported,
                    "File processed"
                );
            }
            Err(e) => {
                WorkerMetrics::record_aborted(e.reason());
                tracing::error!(
                    aggregate_id = %event.aggregate_id,
                    file_path = %event.file_path.display(),
                    error = %e,
                    "File processing aborted"
                );
            }
        }
    }

    /// Process a staged file and report what happened.
    ///
    /// The staged file is removed before this returns, on every path.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::MissingFile`] if the staged file is absent; no events
    /// - [`ProcessingError::MalformedHeader`] if the header is absent or blank;
    ///   no events
    /// - [`ProcessingError::Io`] if reading fails part way; rows before the
    ///   failure keep their outcomes
    pub async fn process_file(
        &self,
        event: &FileIngested,
    ) -> Result<ProcessingReport, ProcessingError> {
        let span = tracing::info_span!("process_file", aggregate_id = %event.aggregate_id);
        self.run(event).instrument(span).await
    }

    async fn run(&self, event: &FileIngested) -> Result<ProcessingReport, ProcessingError> {
        let staged = StagedFileGuard::new(event.file_path.clone());
        let result = self.read_staged(event).await;
        staged.discard().await;
        result
    }

    async fn read_staged(&self, event: &FileIngested) -> Result<ProcessingReport, ProcessingError> {
        let file = match File::open(&event.file_path).await {
            Ok(file) => file.into_std().await,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ProcessingError::MissingFile(event.file_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let (sender, mut lines) = mpsc::channel(LINE_BUFFER);
        let reader = tokio::task::spawn_blocking(move || read_lines(file, &sender));

        let result = self.consume(event, &mut lines).await;

        // Unblocks the reader if consumption stopped early.
        drop(lines);
        match reader.await {
            Ok(()) => result,
            Err(e) => result.and(Err(ProcessingError::Io(io::Error::other(e)))),
        }
    }

    async fn consume(
        &self,
        event: &FileIngested,
        lines: &mut mpsc::Receiver<io::Result<CsvLine>>,
    ) -> Result<ProcessingReport, ProcessingError> {
        let headers = match lines.recv().await.transpose()? {
            Some(CsvLine { fields: Ok(fields), .. }) => parse_header(fields),
            Some(CsvLine { fields: Err(_), .. }) | None => None,
        }
        .ok_or_else(|| ProcessingError::MalformedHeader(event.file_path.clone()))?;

        tracing::debug!(columns = ?headers, "Header read");

        let mut report = ProcessingReport {
            aggregate_id: event.aggregate_id.clone(),
            ..ProcessingReport::default()
        };

        while let Some(parsed) = lines.recv().await {
            let CsvLine { line, fields } = parsed?;
            if fields.as_deref().is_ok_and(is_blank) {
                continue;
            }
            report.rows += 1;

            let outcome = fields.and_then(|values| {
                let row = Row::zip(headers.as_slice(), values.as_slice());
                self.schema.validate(&row, self.clock.now())
            });
            self.apply(outcome, line, &mut report).await;
        }

        Ok(report)
    }

    async fn apply(
        &self,
        outcome: Result<Record, ValidationError>,
        line: u64,
        report: &mut ProcessingReport,
    ) {
        let event = match outcome {
            Ok(record) => {
                let record_id = record.id();
                self.store.save(record);
                report.stored += 1;
                WorkerMetrics::record_stored();
                tracing::debug!(line, %record_id, "Row stored");
                RecordProcessed::success(&report.aggregate_id, record_id, self.clock.now())
            }
            Err(e) => {
                report.rejected += 1;
                WorkerMetrics::record_rejected();
                tracing::warn!(line, error = %e, "Row rejected");
                RecordProcessed::failure(&report.aggregate_id, e.to_string(), self.clock.now())
            }
        };

        let outgoing = DomainEvent::from(event);
        let event_type = outgoing.event_type();
        match publish_with_retry(self.publisher.as_ref(), outgoing, &self.retry_policy).await {
            Ok(()) => PublishMetrics::record_published(event_type),
            Err(e) => {
                report.unreported += 1;
                PublishMetrics::record_failed(event_type);
                tracing::error!(line, error = %e, "Row outcome could not be reported");
            }
        }
    }
}

/// One CSV record as read from the staged file.
#[derive(Debug, PartialEq, Eq)]
struct CsvLine {
    /// Line the record starts on.
    line: u64,
    fields: Result<Vec<String>, ValidationError>,
}

impl CsvLine {
    fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            fields: Err(ValidationError::Malformed {
                reason: reason.into(),
            }),
        }
    }
}

/// Read every record of `source` and hand it to the worker.
///
/// Runs on a blocking thread. Quoted fields may span lines. A record that is
/// not valid UTF-8 becomes a malformed row and reading continues; an I/O
/// error is sent once and ends the read.
fn read_lines<R: io::Read>(source: R, lines: &mpsc::Sender<io::Result<CsvLine>>) {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let mut record = csv::StringRecord::new();

    loop {
        let parsed = match reader.read_record(&mut record) {
            Ok(false) => return,
            Ok(true) => Ok(CsvLine {
                line: record.position().map_or(0, csv::Position::line),
                fields: Ok(record.iter().map(str::to_string).collect()),
            }),
            Err(e) => {
                let line = e
                    .position()
                    .map_or_else(|| reader.position().line(), csv::Position::line);
                let reason = e.to_string();
                match e.into_kind() {
                    csv::ErrorKind::Io(e) => Err(e),
                    csv::ErrorKind::Utf8 { .. } => {
                        Ok(CsvLine::malformed(line, "row is not valid UTF-8"))
                    }
                    _ => Ok(CsvLine::malformed(line, reason)),
                }
            }
        };

        let fatal = parsed.is_err();
        if lines.blocking_send(parsed).is_err() || fatal {
            return;
        }
    }
}

/// Trim the header record into column names.
///
/// Returns `None` when the record carries no column name at all.
fn parse_header(mut fields: Vec<String>) -> Option<Vec<String>> {
    if let Some(first) = fields.first_mut() {
        *first = first.trim_start_matches(BYTE_ORDER_MARK).trim().to_string();
    }
    if fields.iter().all(String::is_empty) {
        return None;
    }
    Some(fields)
}

/// A whitespace-only line reads as a single empty field.
fn is_blank(fields: &[String]) -> bool {
    matches!(fields, [only] if only.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn read_all(source: &[u8]) -> Vec<io::Result<CsvLine>> {
        let (sender, mut receiver) = mpsc::channel(32);
        read_lines(source, &sender);
        drop(sender);

        let mut lines = Vec::new();
        while let Ok(line) = receiver.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn fields(source: &[u8]) -> Vec<Vec<String>> {
        read_all(source)
            .into_iter()
            .map(|line| line.unwrap().fields.unwrap())
            .collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn header_is_trimmed() {
        assert_eq!(
            parse_header(strings(&["firstName ", " lastName", "email"])),
            Some(strings(&["firstName", "lastName", "email"]))
        );
    }

    #[test]
    fn blank_header_is_malformed() {
        assert_eq!(parse_header(Vec::new()), None);
        assert_eq!(parse_header(strings(&[""])), None);
        assert_eq!(parse_header(strings(&["", "", ""])), None);
    }

    #[test]
    fn header_drops_byte_order_mark() {
        assert_eq!(
            parse_header(strings(&["\u{feff}firstName", "email"])),
            Some(strings(&["firstName", "email"]))
        );
    }

    #[test]
    fn quoted_delimiters_stay_in_field() {
        assert_eq!(
            fields(br#"Jane,"Smith, Jr.",jane@example.com"#),
            vec![strings(&["Jane", "Smith, Jr.", "jane@example.com"])]
        );
    }

    #[test]
    fn quoted_newlines_stay_in_field() {
        let source = b"firstName,lastName,email\nJohn,\"Doe\nJr.\",jd@x.io\nAda,L,a@x.io\n";
        let lines = read_all(source);

        let lines: Vec<CsvLine> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].fields, Ok(strings(&["John", "Doe\nJr.", "jd@x.io"])));
        assert_eq!(lines[1].line, 2);
    }

    #[test]
    fn invalid_utf8_is_a_malformed_row() {
        let lines = read_all(b"a,b,email\nA,B,a@x.io\nRen\xe9,C,r@x.io\nD,E,d@x.io\n");

        let lines: Vec<CsvLine> = lines.into_iter().map(Result::unwrap).collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].fields.is_ok());
        assert!(matches!(
            lines[2].fields,
            Err(ValidationError::Malformed { .. })
        ));
        assert_eq!(lines[3].fields, Ok(strings(&["D", "E", "d@x.io"])));
    }

    #[test]
    fn short_rows_keep_their_values() {
        assert_eq!(fields(b"Jane\n"), vec![strings(&["Jane"])]);
    }

    #[test]
    fn whitespace_line_is_blank() {
        let read = fields(b"a,b\n   \n,\n");
        assert!(!is_blank(&read[0]));
        assert!(is_blank(&read[1]));
        assert!(!is_blank(&read[2]));
    }
}
