//! # Bulk Ingest Core
//!
//! Core types and collaborator contracts for the bulk ingest pipeline.
//!
//! The pipeline accepts CSV uploads, announces them with a `FileIngested`
//! event, and lets a worker turn each row into a stored record or a reported
//! rejection.
//!
//! ## Core Concepts
//!
//! - **Event**: Immutable fact emitted by the pipeline ([`event::DomainEvent`])
//! - **Publisher**: Fire-and-forget notification channel ([`event_publisher::EventPublisher`])
//! - **Record**: Validated entity built from one row ([`record::Record`])
//! - **Schema**: Required fields every row must carry ([`record::RecordSchema`])
//! - **Record store**: Primary map plus email index ([`record_store::RecordStore`])
//! - **Environment**: Injected dependencies such as the clock
//!
//! ## Data Flow
//!
//! ```text
//! upload ─► ingestion command ─► staged file + FileIngested
//!                                        │
//!                                        ▼
//!                               processing worker ─► record store
//!                                        │
//!                                        ▼
//!                              RecordProcessed (one per row)
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

pub mod event;
pub mod event_publisher;
pub mod record;
pub mod record_store;

/// Environment module - Dependency injection traits
///
/// External dependencies the pipeline needs are abstracted behind traits and
/// injected at construction time.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use bulk_ingest_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
