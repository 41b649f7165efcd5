//! Dead-letter sink: where messages go once their delivery budget is spent.
//!
//! Only the owning `DurableQueue` can admit records. Everyone else gets a
//! read-only view plus retention purging.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::info;

use super::event::{Event, MessageId};
use super::queue::QueueError;
use crate::clock::Clock;

/// A message that exhausted its delivery attempts.
#[derive(Clone, Debug)]
pub struct DeadLetterRecord {
    pub message_id: MessageId,
    pub event: Event,
    /// Deliveries made before the message was given up on.
    pub receive_count: u32,
    /// Name of the queue the message came from.
    pub source_queue: String,
    pub dead_lettered_at: DateTime<Utc>,
    admitted_at: Instant,
}

impl DeadLetterRecord {
    pub(crate) fn new(
        message_id: MessageId,
        event: Event,
        receive_count: u32,
        source_queue: &str,
        admitted_at: Instant,
    ) -> Self {
        Self {
            message_id,
            event,
            receive_count,
            source_queue: source_queue.to_string(),
            dead_lettered_at: Utc::now(),
            admitted_at,
        }
    }
}

struct SinkInner {
    name: String,
    retention: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<Vec<DeadLetterRecord>>,
}

/// Terminal store for poison messages. Clone-friendly via Arc.
///
/// Records are kept for the retention period and then dropped by
/// `purge_expired`. Nothing here ever hands a record back to a queue.
#[derive(Clone)]
pub struct DeadLetterSink {
    inner: Arc<SinkInner>,
}

impl DeadLetterSink {
    pub fn new(name: impl Into<String>, retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                name: name.into(),
                retention,
                clock,
                records: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn retention(&self) -> Duration {
        self.inner.retention
    }

    fn records_guard(&self) -> Result<MutexGuard<'_, Vec<DeadLetterRecord>>, QueueError> {
        self.inner
            .records
            .lock()
            .map_err(|_| QueueError::Unavailable(format!("{}: lock poisoned", self.inner.name)))
    }

    pub(crate) fn admit(&self, record: DeadLetterRecord) -> Result<(), QueueError> {
        self.records_guard()?.push(record);
        Ok(())
    }

    /// Snapshot of every retained record, oldest first.
    pub fn records(&self) -> Result<Vec<DeadLetterRecord>, QueueError> {
        Ok(self.records_guard()?.clone())
    }

    /// Find a record by the id its queue assigned.
    pub fn get(&self, message_id: &MessageId) -> Result<Option<DeadLetterRecord>, QueueError> {
        Ok(self
            .records_guard()?
            .iter()
            .find(|r| &r.message_id == message_id)
            .cloned())
    }

    /// Find a record by the publisher-assigned event id.
    pub fn find_event(&self, event_id: &str) -> Result<Option<DeadLetterRecord>, QueueError> {
        Ok(self
            .records_guard()?
            .iter()
            .find(|r| r.event.id.as_deref() == Some(event_id))
            .cloned())
    }

    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.records_guard()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.records_guard()?.is_empty())
    }

    /// Drop records older than the retention period. Returns how many went.
    pub fn purge_expired(&self) -> Result<usize, QueueError> {
        let now = self.inner.clock.now();
        let retention = self.inner.retention;
        let mut records = self.records_guard()?;
        let before = records.len();
        records.retain(|r| now.saturating_duration_since(r.admitted_at) < retention);
        let purged = before - records.len();
        if purged > 0 {
            info!(sink = %self.inner.name, purged, "purged expired dead letters");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn record(clock: &ManualClock, id: &str) -> DeadLetterRecord {
        DeadLetterRecord::new(
            MessageId::from(id),
            Event::with_id(id, b"{}".to_vec()),
            3,
            "orders",
            clock.now(),
        )
    }

    #[test]
    fn records_survive_until_retention_elapses() {
        let clock = ManualClock::new();
        let sink = DeadLetterSink::new("dlq", Duration::from_secs(60), Arc::new(clock.clone()));
        sink.admit(record(&clock, "m1")).unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(sink.purge_expired().unwrap(), 0);
        assert_eq!(sink.len().unwrap(), 1);

        clock.advance(Duration::from_secs(1));
        assert_eq!(sink.purge_expired().unwrap(), 1);
        assert!(sink.is_empty().unwrap());
    }

    #[test]
    fn lookup_by_message_and_event_id() {
        let clock = ManualClock::new();
        let sink = DeadLetterSink::new("dlq", Duration::from_secs(60), Arc::new(clock.clone()));
        sink.admit(record(&clock, "m1")).unwrap();

        assert!(sink.get(&MessageId::from("m1")).unwrap().is_some());
        assert!(sink.find_event("m1").unwrap().is_some());
        assert!(sink.find_event("m2").unwrap().is_none());
    }
}
