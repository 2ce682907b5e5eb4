//! In-process event transport.
//!
//! [`ChannelEventPublisher`] routes the two event kinds separately:
//!
//! - `FileIngested` goes onto a bounded work queue ([`FileQueue`]). Every
//!   accepted upload is delivered exactly once; a full queue makes the
//!   publisher wait instead of dropping work.
//! - `RecordProcessed` fans out over a `tokio` broadcast channel to any number
//!   of observers. A slow observer may lag and skip row outcomes, which never
//!   affects file processing.
//!
//! [`Dispatcher`] drains the queue and hands every file to a
//! [`ProcessingWorker`] on its own task, so several files are processed
//! concurrently while rows within one file stay ordered.
//!
//! ```text
//! IngestionCommand ──► FileQueue (mpsc) ──► Dispatcher ──► spawn(worker.process)
//!                                                                │
//!      observers ◄── broadcast ◄──────── RecordProcessed ────────┘
//! ```

use crate::worker::ProcessingWorker;
use bulk_ingest_core::event::{DomainEvent, FileIngested};
use bulk_ingest_core::event_publisher::{EventPublisher, PublishError, PublishFuture};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

/// Publisher backed by a file work queue and a row-outcome broadcast.
///
/// Cloning shares the same channels.
#[derive(Clone, Debug)]
pub struct ChannelEventPublisher {
    files: mpsc::Sender<FileIngested>,
    outcomes: broadcast::Sender<DomainEvent>,
}

/// Receiving end of the file work queue.
#[derive(Debug)]
pub struct FileQueue {
    receiver: mpsc::Receiver<FileIngested>,
}

impl FileQueue {
    /// Next queued file, or `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<FileIngested> {
        self.receiver.recv().await
    }
}

impl ChannelEventPublisher {
    /// Create the publisher and its file queue.
    ///
    /// `capacity` bounds both the queued files and the row outcomes buffered
    /// per observer. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, FileQueue) {
        let capacity = capacity.max(1);
        let (files, receiver) = mpsc::channel(capacity);
        let (outcomes, _) = broadcast::channel(capacity);
        (Self { files, outcomes }, FileQueue { receiver })
    }

    /// Subscribe to row outcomes published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.outcomes.subscribe()
    }

    /// Number of live row-outcome observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.outcomes.receiver_count()
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish(&self, event: DomainEvent) -> PublishFuture<'_> {
        Box::pin(async move {
            let event_type = event.event_type();
            let no_subscribers = || PublishError::NoSubscribers {
                event_type: event_type.to_string(),
            };

            match event {
                DomainEvent::FileIngested(file) => {
                    self.files.send(file).await.map_err(|_| no_subscribers())
                }
                outcome @ DomainEvent::RecordProcessed(_) => {
                    self.outcomes.send(outcome).map(|_| ()).map_err(|_| no_subscribers())
                }
            }
        })
    }
}

/// Routes queued files to a processing worker.
pub struct Dispatcher {
    worker: Arc<ProcessingWorker>,
    queue: FileQueue,
    outcomes: Option<broadcast::Receiver<DomainEvent>>,
}

impl Dispatcher {
    /// Create a dispatcher draining `queue`.
    #[must_use]
    pub fn new(worker: Arc<ProcessingWorker>, queue: FileQueue) -> Self {
        Self {
            worker,
            queue,
            outcomes: None,
        }
    }

    /// Also log row outcomes received on `receiver` at debug level.
    #[must_use]
    pub fn with_outcome_log(mut self, receiver: broadcast::Receiver<DomainEvent>) -> Self {
        self.outcomes = Some(receiver);
        self
    }

    /// Dispatch until the queue closes or `shutdown` resolves, then wait for
    /// in-flight files to finish.
    ///
    /// On shutdown the queue stops accepting files and those already queued
    /// are still processed.
    pub async fn run<S>(mut self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let mut in_flight = JoinSet::new();
        tokio::pin!(shutdown);

        tracing::info!(schema = %self.worker.schema(), "Dispatcher started");

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                queued = self.queue.recv() => match queued {
                    Some(event) => {
                        let worker = Arc::clone(&self.worker);
                        in_flight.spawn(async move { worker.process(&event).await });
                    }
                    None => {
                        tracing::info!("File queue closed");
                        break;
                    }
                },
                received = next_outcome(&mut self.outcomes) => match received {
                    Ok(DomainEvent::RecordProcessed(event)) => {
                        tracing::debug!(
                            aggregate_id = %event.aggregate_id,
                            status = %event.status,
                            record_id = ?event.record_id,
                            error = ?event.error_message,
                            "Row outcome"
                        );
                    }
                    Ok(DomainEvent::FileIngested(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Outcome log lagged, row outcomes skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.outcomes = None;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Processing task failed");
                    }
                }
            }
        }

        self.queue.receiver.close();
        while let Some(event) = self.queue.recv().await {
            let worker = Arc::clone(&self.worker);
            in_flight.spawn(async move { worker.process(&event).await });
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Processing task failed");
            }
        }

        tracing::info!("Dispatcher stopped");
    }
}

/// Next row outcome, or never when no outcome log is attached.
async fn next_outcome(
    receiver: &mut Option<broadcast::Receiver<DomainEvent>>,
) -> Result<DomainEvent, broadcast::error::RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
