//! Durable queue with visibility timeouts and a dead-letter policy.
//!
//! Each dequeue hides the message for the visibility timeout and bumps its
//! receive count. A message that is not acked before its deadline becomes
//! visible again; there is no explicit nack. When a message that has already
//! been received `max_receive_count` times comes up for redelivery, it is
//! moved to the dead-letter sink instead. The move happens at redelivery
//! time and under the same lock that hands out messages, so a message is
//! never in both places and never delivered after it is dead-lettered.
//!
//! The in-process backend keeps everything behind one `Mutex`; clones share
//! the same storage.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dead_letter::{DeadLetterRecord, DeadLetterSink};
use super::event::{Event, MessageId};
use super::sender::Sender;
use super::subscriber::Subscriber;
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{Classify, ErrorKind};

/// Upper bound on a single long-poll sleep, so expiring deadlines are noticed.
const POLL_SLICE: Duration = Duration::from_millis(25);

/// Errors from queue operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue could not be reached (poisoned lock in the in-process backend).
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    /// The handle was never issued by this queue.
    #[error("unknown message handle: {0}")]
    UnknownHandle(String),
    /// The message was redelivered under a newer handle.
    #[error("stale message handle: {0}")]
    StaleHandle(String),
    /// The message has already been moved to the dead-letter sink.
    #[error("message {0} was dead-lettered")]
    DeadLettered(MessageId),
}

impl Classify for QueueError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueueError::Unavailable(_) => ErrorKind::TransientInfra,
            QueueError::StaleHandle(_) => ErrorKind::DuplicateEffect,
            QueueError::UnknownHandle(_) | QueueError::DeadLettered(_) => {
                ErrorKind::PoisonMessage
            }
        }
    }
}

/// Receipt for one delivery of a message. Needed to ack it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageHandle(String);

impl MessageHandle {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A delivered message.
#[derive(Clone, Debug)]
pub struct QueueMessage {
    pub message_id: MessageId,
    pub event: Event,
    /// Number of times this message has been delivered, this one included.
    pub receive_count: u32,
    pub visibility_deadline: Instant,
    pub handle: MessageHandle,
}

/// Result of a successful ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The message was removed from the queue.
    Deleted,
    /// The handle had already been acked; nothing changed.
    AlreadyAcked,
}

/// Visible and in-flight message counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    pub visible: usize,
    pub in_flight: usize,
}

struct InFlight {
    handle: MessageHandle,
    deadline: Instant,
}

struct Pending {
    message_id: MessageId,
    event: Event,
    receive_count: u32,
    in_flight: Option<InFlight>,
}

impl Pending {
    fn is_available(&self, now: Instant) -> bool {
        match &self.in_flight {
            None => true,
            Some(f) => f.deadline <= now,
        }
    }

    fn holds(&self, handle: &MessageHandle) -> bool {
        self.in_flight.as_ref().is_some_and(|f| &f.handle == handle)
    }
}

/// What became of a handle that no longer refers to a pending delivery.
enum Retired {
    Acked,
    Superseded,
    DeadLettered(MessageId),
}

struct Tombstone {
    fate: Retired,
    at: Instant,
}

#[derive(Default)]
struct QueueState {
    messages: VecDeque<Pending>,
    retired: HashMap<MessageHandle, Tombstone>,
}

impl QueueState {
    fn retire(&mut self, handle: MessageHandle, fate: Retired, now: Instant) {
        self.retired.insert(handle, Tombstone { fate, at: now });
    }

    fn fate(&self, handle: &MessageHandle) -> Option<&Retired> {
        self.retired.get(handle).map(|t| &t.fate)
    }

    /// Forget retired handles older than `horizon`. Afterwards they read as
    /// unknown.
    fn prune_retired(&mut self, now: Instant, horizon: Duration) -> usize {
        let before = self.retired.len();
        self.retired
            .retain(|_, t| now.saturating_duration_since(t.at) < horizon);
        before - self.retired.len()
    }
}

struct QueueInner {
    name: String,
    max_receive_count: u32,
    visibility_timeout: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    arrivals: Condvar,
    dead_letters: DeadLetterSink,
}

/// Durable queue with at-least-once delivery.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use motorshop_pipeline::bus::{DurableQueue, Event};
/// use motorshop_pipeline::{PipelineConfig, SystemClock};
///
/// let queue = DurableQueue::new("jobs", &PipelineConfig::default(), Arc::new(SystemClock));
/// queue.enqueue(Event::with_id("e1", "hello")).unwrap();
///
/// let message = queue.dequeue(1).next().unwrap().unwrap();
/// assert_eq!(message.receive_count, 1);
/// queue.ack(&message.handle).unwrap();
/// ```
#[derive(Clone)]
pub struct DurableQueue {
    inner: Arc<QueueInner>,
}

impl DurableQueue {
    /// Create a queue with its own dead-letter sink named `<name>-dlq`.
    pub fn new(name: impl Into<String>, config: &PipelineConfig, clock: Arc<dyn Clock>) -> Self {
        let name = name.into();
        let dead_letters = DeadLetterSink::new(
            format!("{}-dlq", name),
            config.dlq_retention(),
            Arc::clone(&clock),
        );
        Self::with_dead_letter_sink(name, config, clock, dead_letters)
    }

    /// Create a queue that dead-letters into an existing sink.
    pub fn with_dead_letter_sink(
        name: impl Into<String>,
        config: &PipelineConfig,
        clock: Arc<dyn Clock>,
        dead_letters: DeadLetterSink,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                max_receive_count: config.max_receive_count,
                visibility_timeout: config.visibility_timeout(),
                clock,
                state: Mutex::new(QueueState::default()),
                arrivals: Condvar::new(),
                dead_letters,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_receive_count(&self) -> u32 {
        self.inner.max_receive_count
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.inner.visibility_timeout
    }

    /// Read-only view of the dead-letter sink.
    pub fn dead_letters(&self) -> DeadLetterSink {
        self.inner.dead_letters.clone()
    }

    /// Handle that can only enqueue.
    pub fn producer(&self) -> QueueProducer {
        QueueProducer {
            queue: self.clone(),
        }
    }

    /// Handle that can only dequeue and ack.
    pub fn consumer(&self) -> QueueConsumer {
        QueueConsumer {
            queue: self.clone(),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.inner
            .state
            .lock()
            .map_err(|_| QueueError::Unavailable(format!("{}: lock poisoned", self.inner.name)))
    }

    /// Add an event to the back of the queue.
    pub fn enqueue(&self, event: Event) -> Result<MessageId, QueueError> {
        let message_id = MessageId::generate();
        {
            let mut state = self.lock_state()?;
            state.messages.push_back(Pending {
                message_id: message_id.clone(),
                event,
                receive_count: 0,
                in_flight: None,
            });
        }
        self.inner.arrivals.notify_all();
        debug!(queue = %self.inner.name, message_id = %message_id, "enqueued");
        Ok(message_id)
    }

    /// Lazily claim up to `max_batch` visible messages.
    ///
    /// Each call to `next()` claims one message. The sequence ends early
    /// when nothing is visible.
    pub fn dequeue(&self, max_batch: usize) -> Dequeue<'_> {
        Dequeue {
            queue: self,
            remaining: max_batch,
        }
    }

    /// Claim up to `max_batch` messages, waiting up to `wait` for the first.
    pub fn receive(&self, max_batch: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let give_up = Instant::now() + wait;
        loop {
            let batch = self.dequeue(max_batch).collect::<Result<Vec<_>, _>>()?;
            let now = Instant::now();
            if !batch.is_empty() || max_batch == 0 || now >= give_up {
                return Ok(batch);
            }

            let state = self.lock_state()?;
            let slice = (give_up - now).min(POLL_SLICE);
            let _ = self
                .inner
                .arrivals
                .wait_timeout(state, slice)
                .map_err(|_| QueueError::Unavailable(format!("{}: lock poisoned", self.inner.name)))?;
        }
    }

    /// Delete a delivered message. Acking the same handle twice is a no-op
    /// for as long as the handle is remembered (one visibility timeout).
    pub fn ack(&self, handle: &MessageHandle) -> Result<AckOutcome, QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.lock_state()?;

        if let Some(pos) = state.messages.iter().position(|p| p.holds(handle)) {
            if let Some(pending) = state.messages.remove(pos) {
                debug!(
                    queue = %self.inner.name,
                    message_id = %pending.message_id,
                    receive_count = pending.receive_count,
                    "acked"
                );
            }
            state.retire(handle.clone(), Retired::Acked, now);
            return Ok(AckOutcome::Deleted);
        }

        match state.fate(handle) {
            Some(Retired::Acked) => Ok(AckOutcome::AlreadyAcked),
            Some(Retired::Superseded) => Err(QueueError::StaleHandle(handle.to_string())),
            Some(Retired::DeadLettered(id)) => Err(QueueError::DeadLettered(id.clone())),
            None => Err(QueueError::UnknownHandle(handle.to_string())),
        }
    }

    /// Reset a held message's deadline to `timeout` from now.
    pub fn change_visibility(
        &self,
        handle: &MessageHandle,
        timeout: Duration,
    ) -> Result<Instant, QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.lock_state()?;

        if let Some(flight) = state
            .messages
            .iter_mut()
            .filter_map(|p| p.in_flight.as_mut())
            .find(|f| &f.handle == handle)
        {
            flight.deadline = now + timeout;
            return Ok(flight.deadline);
        }

        match state.fate(handle) {
            Some(Retired::DeadLettered(id)) => Err(QueueError::DeadLettered(id.clone())),
            Some(Retired::Superseded) => Err(QueueError::StaleHandle(handle.to_string())),
            Some(Retired::Acked) | None => Err(QueueError::UnknownHandle(handle.to_string())),
        }
    }

    /// Move exhausted messages to the dead-letter sink, purge expired dead
    /// letters and forget old retired handles. Runs on every dequeue;
    /// callable directly as well.
    pub fn sweep(&self) -> Result<usize, QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.lock_state()?;
        self.sweep_locked(&mut state, now)
    }

    fn sweep_locked(&self, state: &mut QueueState, now: Instant) -> Result<usize, QueueError> {
        let max = self.inner.max_receive_count;
        let mut moved = 0;
        let mut i = 0;

        let forgotten = state.prune_retired(now, self.inner.visibility_timeout);
        if forgotten > 0 {
            debug!(queue = %self.inner.name, forgotten, "pruned retired handles");
        }

        while i < state.messages.len() {
            let exhausted = {
                let pending = &state.messages[i];
                pending.is_available(now) && pending.receive_count >= max
            };
            if !exhausted {
                i += 1;
                continue;
            }

            let pending = &state.messages[i];
            self.inner.dead_letters.admit(DeadLetterRecord::new(
                pending.message_id.clone(),
                pending.event.clone(),
                pending.receive_count,
                &self.inner.name,
                now,
            ))?;

            if let Some(pending) = state.messages.remove(i) {
                warn!(
                    queue = %self.inner.name,
                    message_id = %pending.message_id,
                    event_id = pending.event.id.as_deref().unwrap_or(""),
                    receive_count = pending.receive_count,
                    "delivery attempts exhausted, moved to dead-letter sink"
                );
                if let Some(flight) = pending.in_flight {
                    state.retire(flight.handle, Retired::DeadLettered(pending.message_id), now);
                }
                moved += 1;
            }
        }

        self.inner.dead_letters.purge_expired()?;
        Ok(moved)
    }

    fn claim_next(&self) -> Result<Option<QueueMessage>, QueueError> {
        let now = self.inner.clock.now();
        let mut state = self.lock_state()?;
        self.sweep_locked(&mut state, now)?;

        let Some(pending) = state.messages.iter_mut().find(|p| p.is_available(now)) else {
            return Ok(None);
        };

        pending.receive_count += 1;
        let handle = MessageHandle::generate();
        let deadline = now + self.inner.visibility_timeout;
        let previous = pending.in_flight.replace(InFlight {
            handle: handle.clone(),
            deadline,
        });
        let message = QueueMessage {
            message_id: pending.message_id.clone(),
            event: pending.event.clone(),
            receive_count: pending.receive_count,
            visibility_deadline: deadline,
            handle,
        };
        if let Some(previous) = previous {
            state.retire(previous.handle, Retired::Superseded, now);
        }

        debug!(
            queue = %self.inner.name,
            message_id = %message.message_id,
            receive_count = message.receive_count,
            "claimed"
        );

        Ok(Some(message))
    }

    /// Visible and in-flight message counts (dead letters excluded).
    pub fn depth(&self) -> Result<QueueDepth, QueueError> {
        let now = self.inner.clock.now();
        let state = self.lock_state()?;
        let visible = state.messages.iter().filter(|p| p.is_available(now)).count();
        Ok(QueueDepth {
            visible,
            in_flight: state.messages.len() - visible,
        })
    }

    /// Receive count of a pending message, if it is still in the queue.
    pub fn receive_count(&self, message_id: &MessageId) -> Result<Option<u32>, QueueError> {
        Ok(self
            .lock_state()?
            .messages
            .iter()
            .find(|p| &p.message_id == message_id)
            .map(|p| p.receive_count))
    }
}

/// Lazy batch of claimed messages. See `DurableQueue::dequeue`.
pub struct Dequeue<'a> {
    queue: &'a DurableQueue,
    remaining: usize,
}

impl Iterator for Dequeue<'_> {
    type Item = Result<QueueMessage, QueueError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.queue.claim_next() {
            Ok(Some(message)) => {
                self.remaining -= 1;
                Some(Ok(message))
            }
            Ok(None) => {
                self.remaining = 0;
                None
            }
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Enqueue-only capability, handed to topics.
#[derive(Clone)]
pub struct QueueProducer {
    queue: DurableQueue,
}

impl QueueProducer {
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }
}

impl Sender for QueueProducer {
    fn send(&self, event: Event) -> Result<MessageId, QueueError> {
        self.queue.enqueue(event)
    }

    fn destination(&self) -> &str {
        self.queue.name()
    }
}

/// Dequeue/ack-only capability, handed to workers.
#[derive(Clone)]
pub struct QueueConsumer {
    queue: DurableQueue,
}

impl QueueConsumer {
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    /// Lazily claim up to `max_batch` messages without waiting.
    pub fn dequeue(&self, max_batch: usize) -> Dequeue<'_> {
        self.queue.dequeue(max_batch)
    }

    /// Extend the deadline of a message this consumer holds.
    pub fn change_visibility(
        &self,
        handle: &MessageHandle,
        timeout: Duration,
    ) -> Result<Instant, QueueError> {
        self.queue.change_visibility(handle, timeout)
    }
}

impl Subscriber for QueueConsumer {
    fn receive(&self, max_batch: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        self.queue.receive(max_batch, wait)
    }

    fn ack(&self, handle: &MessageHandle) -> Result<AckOutcome, QueueError> {
        self.queue.ack(handle)
    }
}
