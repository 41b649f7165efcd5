//! Core publisher traits for the pipeline.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::event::{Event, MessageId};
use super::topic::Broadcaster;
use crate::error::{Classify, ErrorKind};

/// Error type for publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Events must carry a payload.
    #[error("event payload is empty")]
    EmptyPayload,
    /// The broadcaster could not accept the event.
    #[error("broadcaster unreachable: {0}")]
    Unreachable(String),
    /// The domain value could not be turned into a payload.
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

impl Classify for PublishError {
    fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Unreachable(_) => ErrorKind::TransientInfra,
            PublishError::EmptyPayload | PublishError::Serialization(_) => {
                ErrorKind::PoisonMessage
            }
        }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

/// Trait for publishing events.
///
/// A successful return means the event has been accepted by the
/// broadcaster. What happens downstream is invisible to the caller.
pub trait Publisher: Send + Sync {
    /// Publish a single event.
    fn publish(&self, event: Event) -> Result<MessageId, PublishError>;

    /// Publish multiple events, stopping at the first failure.
    fn publish_batch(&self, events: Vec<Event>) -> Result<Vec<MessageId>, PublishError> {
        events.into_iter().map(|event| self.publish(event)).collect()
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, event: Event) -> Result<MessageId, PublishError> {
        (**self).publish(event)
    }
}

/// Publisher that hands events to a broadcaster synchronously.
///
/// Validates the payload and assigns an id and timestamp when the caller
/// left them unset. Never retries; a failed hand-off is returned as is.
#[derive(Clone)]
pub struct TopicPublisher<B> {
    broadcaster: B,
}

impl<B: Broadcaster> TopicPublisher<B> {
    pub fn new(broadcaster: B) -> Self {
        Self { broadcaster }
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }
}

impl<B: Broadcaster> Publisher for TopicPublisher<B> {
    fn publish(&self, mut event: Event) -> Result<MessageId, PublishError> {
        if event.payload.is_empty() {
            return Err(PublishError::EmptyPayload);
        }
        event.stamp();
        let event_id = event.id.clone().unwrap_or_default();

        match self.broadcaster.deliver(event) {
            Ok(message_id) => {
                debug!(
                    topic = self.broadcaster.name(),
                    event_id = %event_id,
                    message_id = %message_id,
                    "published"
                );
                Ok(message_id)
            }
            Err(err) => {
                warn!(topic = self.broadcaster.name(), event_id = %event_id, error = %err, "publish failed");
                Err(err)
            }
        }
    }
}
