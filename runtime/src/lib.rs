//! # Bulk Ingest Runtime
//!
//! Runtime pieces of the bulk ingest pipeline.
//!
//! ## Core Components
//!
//! - **Ingestion command**: stages an uploaded CSV file and announces it
//! - **Processing worker**: validates rows, stores records, reports row outcomes
//! - **Record store**: in-memory records with a secondary email index
//! - **Query facade**: read access for the outer layers
//! - **Channel transport**: file work queue, row-outcome broadcast, and a
//!   dispatcher feeding the worker
//!
//! ## Example
//!
//! ```rust,no_run
//! use bulk_ingest_core::environment::SystemClock;
//! use bulk_ingest_core::record::RecordSchema;
//! use bulk_ingest_runtime::channel::{ChannelEventPublisher, Dispatcher};
//! use bulk_ingest_runtime::ingest::IngestionCommand;
//! use bulk_ingest_runtime::query::RecordQuery;
//! use bulk_ingest_runtime::record_store::InMemoryRecordStore;
//! use bulk_ingest_runtime::worker::ProcessingWorker;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRecordStore::new());
//! let (publisher, queue) = ChannelEventPublisher::new(1024);
//! let publisher = Arc::new(publisher);
//! let clock = Arc::new(SystemClock);
//!
//! let schema = RecordSchema::Minimal;
//! let worker = ProcessingWorker::new(store.clone(), publisher.clone(), clock.clone(), schema);
//! let dispatcher =
//!     Dispatcher::new(Arc::new(worker), queue).with_outcome_log(publisher.subscribe());
//! tokio::spawn(dispatcher.run(std::future::pending()));
//!
//! let command = IngestionCommand::new("uploads", publisher, clock)?;
//! let csv = b"firstName,lastName,email\nAda,Lovelace,ada@example.com\n";
//! command.handle("people.csv", &csv[..]).await?;
//!
//! let query = RecordQuery::new(store);
//! let _ada = query.get_by_email("ada@example.com");
//! # Ok(())
//! # }
//! ```

/// In-process transport and dispatcher
pub mod channel;

/// Error types for ingestion and processing
pub mod error;

/// Ingestion command
pub mod ingest;

/// Prometheus metrics for observability
pub mod metrics;

/// Read-only facade over the record store
pub mod query;

/// In-memory record store
pub mod record_store;

/// Retry logic with exponential backoff
pub mod retry;

/// Processing worker
pub mod worker;

mod staging;

pub use channel::{ChannelEventPublisher, Dispatcher, FileQueue};
pub use error::{IngestionError, ProcessingError};
pub use ingest::IngestionCommand;
pub use query::RecordQuery;
pub use record_store::InMemoryRecordStore;
pub use retry::RetryPolicy;
pub use worker::{ProcessingReport, ProcessingWorker};
