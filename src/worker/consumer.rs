use std::time::Duration;

use tracing::{debug, info, warn};

use super::handler::MessageHandler;
use crate::bus::{QueueError, QueueMessage, Subscriber};
use crate::config::PipelineConfig;
use crate::error::{Classify, ErrorKind};

/// Minimum pause after a failed receive, so a broken queue is not polled
/// in a tight loop.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handler succeeded and the message was deleted.
    Acked,
    /// Handler found the effect already applied; the message was deleted.
    AckedDuplicate,
    /// Handler failed. The message was left for the queue to redeliver or
    /// dead-letter.
    Abandoned(ErrorKind),
    /// Handler succeeded but the ack was refused (e.g. the visibility window
    /// lapsed and the message went to another worker).
    AckFailed(ErrorKind),
}

/// Result of one receive-and-process round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub received: usize,
    pub acked: usize,
    pub duplicates: usize,
    pub abandoned: usize,
    pub ack_failed: usize,
}

impl DrainResult {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Acked => self.acked += 1,
            Delivery::AckedDuplicate => self.duplicates += 1,
            Delivery::Abandoned(_) => self.abandoned += 1,
            Delivery::AckFailed(_) => self.ack_failed += 1,
        }
    }
}

/// Pulls messages from a queue and runs a handler on each.
///
/// The worker never deletes a message it failed to process and never
/// touches the dead-letter sink. A failure just means no ack; the queue's
/// visibility timeout and receive-count policy decide what happens next.
pub struct ConsumerWorker<S, H> {
    subscriber: S,
    handler: H,
    worker_id: String,
    batch_size: usize,
    poll_timeout: Duration,
}

impl<S, H> ConsumerWorker<S, H> {
    /// Create a worker with the default pipeline policy.
    pub fn new(subscriber: S, handler: H) -> Self {
        Self::from_config(subscriber, handler, &PipelineConfig::default())
    }

    pub fn from_config(subscriber: S, handler: H, config: &PipelineConfig) -> Self {
        Self {
            subscriber,
            handler,
            worker_id: config.worker_id.clone(),
            batch_size: config.batch_size.max(1),
            poll_timeout: config.poll_timeout(),
        }
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set the number of messages taken per receive.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set how long a receive waits on an empty queue.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<S: Subscriber, H: MessageHandler> ConsumerWorker<S, H> {
    /// Run the handler on one delivered message and ack it on success.
    pub fn process_message(&self, message: &QueueMessage) -> Delivery {
        debug!(
            worker = %self.worker_id,
            message_id = %message.message_id,
            receive_count = message.receive_count,
            "processing"
        );

        let duplicate = match self.handler.handle(&message.event) {
            Ok(()) => false,
            Err(err) if err.kind().is_benign() => {
                debug!(worker = %self.worker_id, message_id = %message.message_id, "{}", err);
                true
            }
            Err(err) => {
                warn!(
                    worker = %self.worker_id,
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    kind = %err.kind(),
                    error = %err,
                    "processing failed, leaving message for redelivery"
                );
                return Delivery::Abandoned(err.kind());
            }
        };

        match self.subscriber.ack(&message.handle) {
            Ok(_) => {
                info!(
                    worker = %self.worker_id,
                    message_id = %message.message_id,
                    receive_count = message.receive_count,
                    duplicate,
                    "acked"
                );
                if duplicate {
                    Delivery::AckedDuplicate
                } else {
                    Delivery::Acked
                }
            }
            Err(err) => {
                warn!(
                    worker = %self.worker_id,
                    message_id = %message.message_id,
                    error = %err,
                    "ack refused"
                );
                Delivery::AckFailed(err.kind())
            }
        }
    }

    /// Process an already-received batch.
    pub fn process_batch(&self, messages: &[QueueMessage]) -> DrainResult {
        let mut result = DrainResult {
            received: messages.len(),
            ..Default::default()
        };
        for message in messages {
            result.record(self.process_message(message));
        }
        result
    }

    /// Receive up to `batch_size` messages (waiting up to the poll timeout)
    /// and process them.
    pub fn run_once(&self) -> Result<DrainResult, QueueError> {
        let messages = self.subscriber.receive(self.batch_size, self.poll_timeout)?;
        Ok(self.process_batch(&messages))
    }

    /// Keep receiving until `should_stop` returns `true`.
    ///
    /// `should_stop` is checked before every receive. Stopping never waits
    /// for anything in flight: unacked messages reappear after their
    /// visibility deadline.
    pub fn run_until<F: FnMut() -> bool>(&self, mut should_stop: F) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(worker = %self.worker_id, batch_size = self.batch_size, "worker started");

        while !should_stop() {
            stats.polls += 1;
            match self.run_once() {
                Ok(result) => stats.absorb(&result),
                Err(err) => {
                    stats.receive_errors += 1;
                    warn!(worker = %self.worker_id, error = %err, "receive failed");
                    std::thread::sleep(self.poll_timeout.max(RECEIVE_ERROR_BACKOFF));
                }
            }
        }

        info!(
            worker = %self.worker_id,
            acked = stats.acked,
            abandoned = stats.abandoned,
            "worker stopped"
        );
        stats
    }
}

/// Counters accumulated by a running worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub polls: usize,
    pub received: usize,
    pub acked: usize,
    pub duplicates: usize,
    pub abandoned: usize,
    pub ack_failed: usize,
    pub receive_errors: usize,
}

impl WorkerStats {
    pub fn absorb(&mut self, result: &DrainResult) {
        self.received += result.received;
        self.acked += result.acked;
        self.duplicates += result.duplicates;
        self.abandoned += result.abandoned;
        self.ack_failed += result.ack_failed;
    }
}
