//! Consumer workers: receive, process, ack.
//!
//! Per message, from the worker's point of view:
//!
//! ```text
//! Received ──▶ Processing ──┬──▶ Acked
//!                           └──▶ Abandoned (no ack; the queue owns what happens next)
//! ```
//!
//! Retry policy lives only in the queue. A worker never retries locally,
//! never deletes a failed message and never writes to the dead-letter sink.

mod consumer;
mod handler;
mod thread;

pub use consumer::{ConsumerWorker, Delivery, DrainResult, WorkerStats};
pub use handler::{HandlerError, MessageHandler};
pub use thread::WorkerThread;
