//! Event publisher abstraction for asynchronous notification.
//!
//! The pipeline never talks to a message queue directly. The ingestion command
//! and the processing worker depend only on the [`EventPublisher`] trait and
//! treat every publish as an operation that may fail.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   FileIngested    ┌───────────────┐
//! │ Ingestion command│ ────────────────► │               │
//! └──────────────────┘                   │   Publisher   │──► transport
//! ┌──────────────────┐  RecordProcessed  │ (at-least-once│    (channel, queue…)
//! │ Processing worker│ ────────────────► │   delivery)   │
//! └──────────────────┘                   └───────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Send returns an outcome, not a guarantee**: callers decide how to react
//!   to [`PublishError`]
//! - **At-least-once delivery**: consumers may see an event more than once
//! - **Transport-agnostic**: implementations live outside this crate
//!
//! # Implementations
//!
//! - `ChannelEventPublisher` (runtime crate) - in-process file queue and row-outcome broadcast
//! - `RecordingEventPublisher` (testing crate) - captures events for assertions

use crate::event::DomainEvent;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while publishing an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Nobody is listening on the channel.
    #[error("No subscribers for event {event_type}")]
    NoSubscribers {
        /// The event type that could not be delivered
        event_type: String,
    },

    /// The transport refused the event.
    #[error("Publish rejected for event {event_type}: {reason}")]
    Rejected {
        /// The event type that was rejected
        event_type: String,
        /// The reason for rejection
        reason: String,
    },

    /// Failed to encode the event for the wire.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Network or transport error
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Future returned by [`EventPublisher::publish`].
pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;

/// Trait for event publisher implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one publisher is shared by the
/// ingestion command and every concurrently running worker.
///
/// # Dyn Compatibility
///
/// Returns an explicit boxed future so the publisher can be held as
/// `Arc<dyn EventPublisher>`.
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the transport did not accept the event.
    fn publish(&self, event: DomainEvent) -> PublishFuture<'_>;
}

impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    fn publish(&self, event: DomainEvent) -> PublishFuture<'_> {
        (**self).publish(event)
    }
}
