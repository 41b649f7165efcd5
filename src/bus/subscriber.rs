//! Subscriber trait: the consuming side of a queue.

use std::time::Duration;

use super::queue::{AckOutcome, MessageHandle, QueueError, QueueMessage};

/// Pull-based consumer interface.
///
/// There is no `nack`. A message that is not acked becomes visible again
/// once its visibility deadline passes.
pub trait Subscriber: Send + Sync {
    /// Claim up to `max_batch` messages, waiting up to `wait` for the first.
    fn receive(&self, max_batch: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a delivered message. Acking twice is a no-op.
    fn ack(&self, handle: &MessageHandle) -> Result<AckOutcome, QueueError>;
}
