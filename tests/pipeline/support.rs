//! Shared fixtures for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use motorshop_pipeline::bus::Event;
use motorshop_pipeline::store::{InMemoryObjectStore, ObjectStore};
use motorshop_pipeline::worker::{HandlerError, MessageHandler};
use motorshop_pipeline::{AppConfig, ManualClock, Pipeline};

/// A pipeline on a manual clock with default policy.
pub fn pipeline() -> (Pipeline, ManualClock) {
    let clock = ManualClock::new();
    let pipeline = Pipeline::wire(&AppConfig::default(), Arc::new(clock.clone())).unwrap();
    (pipeline, clock)
}

pub fn prospect_event(id: &str, name: &str, model: &str) -> Event {
    Event::with_id(id, format!(r#"{{"name":"{name}","model":"{model}"}}"#))
}

/// Fails with a transient error for the first `failures` calls, then writes
/// the event payload to `effects/<event id>`.
pub struct FlakyHandler {
    failures: usize,
    calls: AtomicUsize,
    objects: InMemoryObjectStore,
}

impl FlakyHandler {
    pub fn new(failures: usize, objects: InMemoryObjectStore) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            objects,
        }
    }

    pub fn always_failing() -> Self {
        Self::new(usize::MAX, InMemoryObjectStore::new("unused"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageHandler for FlakyHandler {
    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(HandlerError::TransientInfra(format!("attempt {} failed", call + 1)));
        }
        let key = format!("effects/{}", event.id.as_deref().unwrap_or("unknown"));
        self.objects.put_object(&key, event.payload.clone())?;
        Ok(())
    }
}
