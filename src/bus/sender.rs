//! Sender trait: point-to-point hand-off into a single queue.

use super::event::{Event, MessageId};
use super::queue::QueueError;

/// Something that accepts events for exactly one queue.
///
/// Topics hold their subscriptions as `Sender`s, so a subscription can
/// enqueue but never read, ack or dead-letter.
pub trait Sender: Send + Sync {
    /// Durably accept an event. Returns the id the queue assigned.
    fn send(&self, event: Event) -> Result<MessageId, QueueError>;

    /// Name of the queue behind this sender, for logs.
    fn destination(&self) -> &str;
}
