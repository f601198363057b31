//! Processing Queue
//!
//! At-least-once delivery of "process pipeline X" requests to the processing
//! worker. Requests for a pipeline that is already waiting in the queue are
//! coalesced into the waiting one; a failed pass is re-enqueued with
//! exponential backoff.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::service::processing::AtomicProcessingService;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("processing queue is closed")]
    Closed,
}

/// Sink for processing requests
#[async_trait]
pub trait ProcessingQueue: Send + Sync {
    /// Requests a processing pass for a pipeline
    async fn enqueue(&self, pipeline_id: Uuid) -> Result<(), QueueError>;
}

/// A queued request to process one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRequest {
    pub pipeline_id: Uuid,
    /// Number of failed passes so far
    pub attempt: u32,
}

impl ProcessRequest {
    pub fn new(pipeline_id: Uuid) -> Self {
        Self {
            pipeline_id,
            attempt: 0,
        }
    }

    fn retry(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// In-process queue over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<ProcessRequest>,
    waiting: Arc<Mutex<HashSet<Uuid>>>,
}

impl ChannelQueue {
    /// Creates the queue and the receiving end handed to the worker
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            sender,
            waiting: Arc::new(Mutex::new(HashSet::new())),
        };
        (queue, receiver)
    }

    fn push(&self, request: ProcessRequest) -> Result<(), QueueError> {
        if !self.waiting().insert(request.pipeline_id) {
            debug!(
                "Pipeline {} already queued, coalescing request",
                request.pipeline_id
            );
            return Ok(());
        }

        self.sender.send(request).map_err(|_| {
            self.waiting().remove(&request.pipeline_id);
            QueueError::Closed
        })
    }

    /// Marks a request as picked up so new triggers queue again
    fn take(&self, pipeline_id: Uuid) {
        self.waiting().remove(&pipeline_id);
    }

    fn waiting(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProcessingQueue for ChannelQueue {
    async fn enqueue(&self, pipeline_id: Uuid) -> Result<(), QueueError> {
        self.push(ProcessRequest::new(pipeline_id))
    }
}

/// Worker draining the queue into the processing service
pub struct ProcessWorker {
    service: Arc<AtomicProcessingService>,
    queue: ChannelQueue,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ProcessWorker {
    pub fn new(
        service: Arc<AtomicProcessingService>,
        queue: ChannelQueue,
        concurrency: usize,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            service,
            queue,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            max_retries,
            retry_delay,
        }
    }

    /// Runs until every sender of the queue is gone
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<ProcessRequest>) {
        info!(
            "Starting pipeline process worker (concurrency: {})",
            self.semaphore.available_permits()
        );

        while let Some(request) = receiver.recv().await {
            self.queue.take(request.pipeline_id);

            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                break;
            };

            let service = Arc::clone(&self.service);
            let queue = self.queue.clone();
            let max_retries = self.max_retries;
            let retry_delay = self.retry_delay;

            tokio::spawn(async move {
                Self::handle(service, queue, request, max_retries, retry_delay).await;
                drop(permit);
            });
        }

        info!("Pipeline process worker stopped");
    }

    async fn handle(
        service: Arc<AtomicProcessingService>,
        queue: ChannelQueue,
        request: ProcessRequest,
        max_retries: u32,
        retry_delay: Duration,
    ) {
        let pipeline_id = request.pipeline_id;

        match service.process(pipeline_id).await {
            Ok(outcome) => {
                debug!("Pipeline {} process request: {:?}", pipeline_id, outcome);
            }
            Err(e) if request.attempt < max_retries => {
                let delay = retry_delay.saturating_mul(2u32.saturating_pow(request.attempt));
                warn!(
                    "Processing pipeline {} failed (attempt {}/{}), retrying in {:?}: {}",
                    pipeline_id,
                    request.attempt + 1,
                    max_retries + 1,
                    delay,
                    e
                );

                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = queue.push(request.retry()) {
                        error!("Failed to re-enqueue pipeline {}: {}", pipeline_id, e);
                    }
                });
            }
            Err(e) => {
                error!(
                    "Giving up on pipeline {} after {} attempts: {}",
                    pipeline_id,
                    request.attempt + 1,
                    e
                );
            }
        }
    }
}
