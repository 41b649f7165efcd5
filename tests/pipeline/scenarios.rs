//! Delivery scenarios: retry to success, dead-lettering, competing
//! consumers, crash before ack.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use motorshop_pipeline::bus::{Publisher, QueueError, Subscriber};
use motorshop_pipeline::store::InMemoryObjectStore;
use motorshop_pipeline::worker::{ConsumerWorker, Delivery};
use motorshop_pipeline::{Classify, ErrorKind};

use crate::support::{pipeline, prospect_event, FlakyHandler};

#[test]
fn retried_until_third_attempt_succeeds() {
    let (pipeline, clock) = pipeline();
    let objects = InMemoryObjectStore::new("effects");
    pipeline
        .publisher()
        .publish(prospect_event("e1", "SuperBike", "2022"))
        .unwrap();

    let consumer = pipeline.consumer();
    let worker = ConsumerWorker::new(pipeline.consumer(), FlakyHandler::new(2, objects.clone()));

    let mut observed = Vec::new();
    for _ in 0..3 {
        let message = consumer.receive(1, Duration::ZERO).unwrap().remove(0);
        observed.push(message.receive_count);
        if worker.process_message(&message) == Delivery::Acked {
            break;
        }
        clock.advance(pipeline.queue().visibility_timeout());
    }

    assert_eq!(observed, vec![1, 2, 3]);
    assert_eq!(worker.handler().calls(), 3);
    assert_eq!(objects.list("effects/").unwrap(), vec!["effects/e1"]);
    assert_eq!(pipeline.queue().depth().unwrap().visible, 0);
    assert_eq!(pipeline.queue().depth().unwrap().in_flight, 0);
    assert!(pipeline.dead_letters().is_empty().unwrap());
}

#[test]
fn always_failing_message_is_dead_lettered_after_three_attempts() {
    let (pipeline, clock) = pipeline();
    pipeline
        .publisher()
        .publish(prospect_event("e2", "SuperBike", "2022"))
        .unwrap();

    let worker = ConsumerWorker::new(pipeline.consumer(), FlakyHandler::always_failing())
        .with_poll_timeout(Duration::ZERO);

    for _ in 0..3 {
        let result = worker.run_once().unwrap();
        assert_eq!(result.abandoned, 1);
        clock.advance(pipeline.queue().visibility_timeout());
    }

    let result = worker.run_once().unwrap();
    assert_eq!(result.received, 0);
    assert_eq!(worker.handler().calls(), 3);

    let record = pipeline.dead_letters().find_event("e2").unwrap().unwrap();
    assert_eq!(record.receive_count, 3);
    assert_eq!(record.source_queue, pipeline.queue().name());
    assert_eq!(record.event.payload_str(), Some(r#"{"name":"SuperBike","model":"2022"}"#));

    clock.advance(pipeline.queue().visibility_timeout());
    assert!(pipeline.consumer().receive(1, Duration::ZERO).unwrap().is_empty());
}

#[test]
fn concurrent_receivers_never_share_a_message() {
    let (pipeline, clock) = pipeline();
    pipeline
        .publisher()
        .publish(prospect_event("e3", "SuperBike", "2022"))
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let receivers: Vec<_> = (0..2)
        .map(|_| {
            let consumer = pipeline.consumer();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                consumer.receive(1, Duration::ZERO).unwrap()
            })
        })
        .collect();

    let batches: Vec<_> = receivers.into_iter().map(|h| h.join().unwrap()).collect();
    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, 1);

    assert!(pipeline.consumer().receive(1, Duration::ZERO).unwrap().is_empty());
    clock.advance(pipeline.queue().visibility_timeout());
    let again = pipeline.consumer().receive(1, Duration::ZERO).unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].receive_count, 2);
}

#[test]
fn crash_before_ack_redelivers_after_deadline() {
    let (pipeline, clock) = pipeline();
    pipeline
        .publisher()
        .publish(prospect_event("e4", "SuperBike", "2022"))
        .unwrap();

    let consumer = pipeline.consumer();
    let first = consumer.receive(1, Duration::ZERO).unwrap().remove(0);
    assert_eq!(first.receive_count, 1);
    // The worker holding `first` dies here without acking.

    clock.advance(pipeline.queue().visibility_timeout() - Duration::from_secs(1));
    assert!(consumer.receive(1, Duration::ZERO).unwrap().is_empty());

    clock.advance(Duration::from_secs(1));
    let second = consumer.receive(1, Duration::ZERO).unwrap().remove(0);
    assert_eq!(second.message_id, first.message_id);
    assert_eq!(second.receive_count, 2);
    assert_eq!(second.event, first.event);

    let err = consumer.ack(&first.handle).unwrap_err();
    assert!(matches!(err, QueueError::StaleHandle(_)));
    assert_eq!(err.kind(), ErrorKind::DuplicateEffect);
    consumer.ack(&second.handle).unwrap();
}
