//! # Bulk Ingest Testing
//!
//! Testing utilities and helpers for the bulk ingest pipeline.
//!
//! This crate provides:
//! - Mock implementations of the collaborator traits
//! - CSV fixture helpers
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use bulk_ingest_testing::{RecordingEventPublisher, test_clock, fixtures};
//!
//! #[tokio::test]
//! async fn stores_one_record() {
//!     let dir = tempfile::tempdir().unwrap();
//!     let publisher = Arc::new(RecordingEventPublisher::new());
//!     let clock = Arc::new(test_clock());
//!     let worker = ProcessingWorker::new(store, publisher.clone(), clock, RecordSchema::Minimal);
//!
//!     let csv = "firstName,lastName,email\nA,B,a@b.c\n";
//!     let event = fixtures::stage_csv(dir.path(), csv).unwrap();
//!     worker.process(&event).await;
//!
//!     assert_eq!(publisher.record_events().len(), 1);
//! }
//! ```

use bulk_ingest_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use bulk_ingest_core::event::{DomainEvent, FileIngested, RecordProcessed};
    use bulk_ingest_core::event_publisher::{EventPublisher, PublishError, PublishFuture};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bulk_ingest_testing::mocks::FixedClock;
    /// use bulk_ingest_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }

    type RejectFn = dyn Fn(&DomainEvent) -> bool + Send + Sync;

    /// Publisher that keeps every accepted event in memory.
    ///
    /// Can be told to refuse events, either the first `n` attempts or any
    /// event matching a predicate, to exercise publish-failure paths.
    /// Refused events are not recorded.
    #[derive(Clone, Default)]
    pub struct RecordingEventPublisher {
        events: Arc<Mutex<Vec<DomainEvent>>>,
        attempts: Arc<AtomicUsize>,
        reject_first: usize,
        reject_when: Option<Arc<RejectFn>>,
    }

    impl RecordingEventPublisher {
        /// A publisher that accepts everything.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Refuse the first `n` publish attempts.
        #[must_use]
        pub const fn reject_first(mut self, n: usize) -> Self {
            self.reject_first = n;
            self
        }

        /// Refuse every event for which `predicate` returns true.
        #[must_use]
        pub fn reject_when<F>(mut self, predicate: F) -> Self
        where
            F: Fn(&DomainEvent) -> bool + Send + Sync + 'static,
        {
            self.reject_when = Some(Arc::new(predicate));
            self
        }

        /// Refuse every event.
        #[must_use]
        pub fn rejecting() -> Self {
            Self::new().reject_when(|_| true)
        }

        /// Accepted events in publish order.
        #[must_use]
        pub fn events(&self) -> Vec<DomainEvent> {
            self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// Accepted `FileIngested` events.
        #[must_use]
        pub fn file_events(&self) -> Vec<FileIngested> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    DomainEvent::FileIngested(e) => Some(e),
                    DomainEvent::RecordProcessed(_) => None,
                })
                .collect()
        }

        /// Accepted `RecordProcessed` events.
        #[must_use]
        pub fn record_events(&self) -> Vec<RecordProcessed> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    DomainEvent::RecordProcessed(e) => Some(e),
                    DomainEvent::FileIngested(_) => None,
                })
                .collect()
        }

        /// Publish attempts seen, refused ones included.
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn refuses(&self, attempt: usize, event: &DomainEvent) -> bool {
            attempt < self.reject_first || self.reject_when.as_ref().is_some_and(|p| p(event))
        }
    }

    impl EventPublisher for RecordingEventPublisher {
        fn publish(&self, event: DomainEvent) -> PublishFuture<'_> {
            Box::pin(async move {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                if self.refuses(attempt, &event) {
                    return Err(PublishError::Rejected {
                        event_type: event.event_type().to_string(),
                        reason: "refused by test publisher".to_string(),
                    });
                }
                self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
                Ok(())
            })
        }
    }
}

/// CSV fixture helpers.
pub mod fixtures {
    use bulk_ingest_core::event::FileIngested;
    use chrono::Utc;
    use std::io;
    use std::path::Path;
    use uuid::Uuid;

    /// Header line of the minimal schema.
    pub const MINIMAL_HEADER: &str = "firstName,lastName,email";

    /// Header line of the extended schema.
    pub const EXTENDED_HEADER: &str =
        "firstName,lastName,email,phoneNumber,address,birthDate,status";

    /// Write `contents` into `dir` the way the ingestion command stages a
    /// file, and return the event announcing it.
    ///
    /// Contents are raw bytes, so fixtures may carry invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn stage_csv(dir: &Path, contents: impl AsRef<[u8]>) -> io::Result<FileIngested> {
        let contents = contents.as_ref();
        let aggregate_id = Uuid::new_v4().to_string();
        let path = dir.join(format!("{aggregate_id}.csv"));
        std::fs::write(&path, contents)?;

        Ok(FileIngested::new(
            aggregate_id,
            path,
            "fixture.csv",
            "text/csv",
            contents.len() as u64,
            Utc::now(),
        ))
    }

    /// An event pointing at a file that was never staged.
    #[must_use]
    pub fn missing_file(dir: &Path) -> FileIngested {
        let aggregate_id = Uuid::new_v4().to_string();
        let path = dir.join(format!("{aggregate_id}.csv"));
        FileIngested::new(aggregate_id, path, "gone.csv", "text/csv", 0, Utc::now())
    }

    /// Render minimal-schema rows as CSV text with a header.
    #[must_use]
    pub fn minimal_csv(rows: &[(&str, &str, &str)]) -> String {
        let mut out = format!("{MINIMAL_HEADER}\n");
        for (first, last, email) in rows {
            out.push_str(&format!("{first},{last},{email}\n"));
        }
        out
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// A plausible, CSV-safe email address.
    pub fn email() -> impl Strategy<Value = String> {
        ("[a-z]{1,8}", "[a-z]{1,8}").prop_map(|(user, domain)| format!("{user}@{domain}.test"))
    }

    /// A CSV-safe name, possibly blank.
    pub fn name() -> impl Strategy<Value = String> {
        prop_oneof![4 => "[A-Z][a-z]{0,9}", 1 => Just(String::new())]
    }

    /// A minimal-schema row whose email may be blank.
    pub fn minimal_row() -> impl Strategy<Value = (String, String, String)> {
        (name(), name(), prop_oneof![4 => email(), 1 => Just(String::new())])
    }
}

pub use fixtures::stage_csv;
pub use mocks::{FixedClock, RecordingEventPublisher, test_clock};

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bulk_ingest_core::event::{DomainEvent, RecordProcessed};
    use bulk_ingest_core::event_publisher::EventPublisher;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn recording_publisher_keeps_accepted_events() {
        let publisher = RecordingEventPublisher::new().reject_first(1);
        let event = DomainEvent::from(RecordProcessed::failure("f", "x", Utc::now()));

        assert!(publisher.publish(event.clone()).await.is_err());
        assert!(publisher.publish(event.clone()).await.is_ok());

        assert_eq!(publisher.attempts(), 2);
        assert_eq!(publisher.events(), vec![event]);
        assert_eq!(publisher.record_events().len(), 1);
        assert!(publisher.file_events().is_empty());
    }

    #[tokio::test]
    async fn predicate_rejects_matching_events() {
        let publisher = RecordingEventPublisher::new().reject_when(|e| e.aggregate_id() == "bad");

        let bad = DomainEvent::from(RecordProcessed::failure("bad", "x", Utc::now()));
        let good = DomainEvent::from(RecordProcessed::failure("good", "x", Utc::now()));

        assert!(publisher.publish(bad).await.is_err());
        assert!(publisher.publish(good).await.is_ok());
        assert_eq!(publisher.events().len(), 1);
    }

    #[test]
    fn stage_csv_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let event = stage_csv(dir.path(), "a,b\n").unwrap();

        assert_eq!(std::fs::read_to_string(&event.file_path).unwrap(), "a,b\n");
        assert_eq!(event.file_size, 4);
        assert!(!fixtures::missing_file(dir.path()).file_path.exists());
    }
}
