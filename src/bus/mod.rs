//! Message bus: topic fan-out into durable queues.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   publish    ┌─────────────┐   send (raw)   ┌──────────────┐
//! │  TopicPublisher  │ ───────────▶ │    Topic    │ ─────────────▶ │ DurableQueue │
//! │ (Publisher)      │              │(Broadcaster)│  one per sub   │              │
//! └──────────────────┘              └─────────────┘                └──────┬───────┘
//!                                                                         │ receive / ack
//!                                              max_receive_count          ▼
//!                                  ┌────────────────┐  exceeded   ┌───────────────┐
//!                                  │ DeadLetterSink │ ◀────────── │ QueueConsumer │
//!                                  └────────────────┘             └───────────────┘
//! ```
//!
//! Components only ever see the capability they need: a topic holds
//! `QueueProducer`s (enqueue only), a worker holds a `QueueConsumer`
//! (dequeue and ack only), and nobody outside the queue can write to the
//! dead-letter sink.

mod dead_letter;
mod event;
mod publisher;
mod queue;
mod sender;
mod subscriber;
mod topic;

pub use dead_letter::{DeadLetterRecord, DeadLetterSink};
pub use event::{Event, MessageId};
pub use publisher::{PublishError, Publisher, TopicPublisher};
pub use queue::{
    AckOutcome, Dequeue, DurableQueue, MessageHandle, QueueConsumer, QueueDepth, QueueError,
    QueueMessage, QueueProducer,
};
pub use sender::Sender;
pub use subscriber::Subscriber;
pub use topic::{Broadcaster, SubscriptionId, Topic};
