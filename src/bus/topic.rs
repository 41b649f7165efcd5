//! Topic: fans each published event out to every subscribed queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::event::{Event, MessageId};
use super::publisher::PublishError;
use super::sender::Sender;

/// Accepts an event on behalf of all of its subscribers.
pub trait Broadcaster: Send + Sync {
    /// Deliver `event` to every current subscriber. Returns once all of
    /// them have durably accepted it.
    fn deliver(&self, event: Event) -> Result<MessageId, PublishError>;

    fn name(&self) -> &str;
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn deliver(&self, event: Event) -> Result<MessageId, PublishError> {
        (**self).deliver(event)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Identifies one subscription on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    sender: Arc<dyn Sender>,
}

struct TopicInner {
    name: String,
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    reachable: AtomicBool,
}

/// In-process topic with raw message delivery.
///
/// Every subscriber receives the event exactly as published: same payload
/// bytes, same attributes, no notification envelope. Subscribers are
/// delivered to independently and no ordering is promised.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use motorshop_pipeline::bus::{Broadcaster, DurableQueue, Event, Topic};
/// use motorshop_pipeline::{PipelineConfig, SystemClock};
///
/// let topic = Topic::new("model-design");
/// let queue = DurableQueue::new("prospects", &PipelineConfig::default(), Arc::new(SystemClock));
/// topic.subscribe(queue.producer());
///
/// topic.deliver(Event::with_id("e1", "{}")).unwrap();
/// assert_eq!(queue.depth().unwrap().visible, 1);
/// ```
#[derive(Clone)]
pub struct Topic {
    inner: Arc<TopicInner>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TopicInner {
                name: name.into(),
                subscriptions: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                reachable: AtomicBool::new(true),
            }),
        }
    }

    /// Subscribe a queue. Only events delivered after this call reach it.
    pub fn subscribe<S: Sender + 'static>(&self, sender: S) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(topic = %self.inner.name, queue = sender.destination(), "subscribed");
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions.push(Subscription {
            id,
            sender: Arc::new(sender),
        });
        id
    }

    /// Remove a subscription. Returns `true` if it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscriptions
            .read()
            .map(|s| s.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    /// Mark the topic as (un)reachable. While unreachable every delivery
    /// fails with `PublishError::Unreachable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    fn senders(&self) -> Result<Vec<Arc<dyn Sender>>, PublishError> {
        let subscriptions = self
            .inner
            .subscriptions
            .read()
            .map_err(|_| PublishError::Unreachable(format!("{}: lock poisoned", self.inner.name)))?;
        Ok(subscriptions.iter().map(|s| Arc::clone(&s.sender)).collect())
    }
}

impl Broadcaster for Topic {
    fn deliver(&self, event: Event) -> Result<MessageId, PublishError> {
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(PublishError::Unreachable(self.inner.name.clone()));
        }

        let message_id = MessageId::generate();
        let senders = self.senders()?;
        if senders.is_empty() {
            debug!(topic = %self.inner.name, message_id = %message_id, "no subscribers, event dropped");
            return Ok(message_id);
        }

        let mut failed = Vec::new();
        for sender in &senders {
            if let Err(err) = sender.send(event.clone()) {
                warn!(
                    topic = %self.inner.name,
                    queue = sender.destination(),
                    error = %err,
                    "subscriber rejected event"
                );
                failed.push(sender.destination().to_string());
            }
        }

        if failed.is_empty() {
            Ok(message_id)
        } else {
            Err(PublishError::Unreachable(format!(
                "{}: delivery failed for {}",
                self.inner.name,
                failed.join(", ")
            )))
        }
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}
