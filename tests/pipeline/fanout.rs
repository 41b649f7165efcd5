//! Topic fan-out into several queues.

use std::sync::Arc;
use std::time::Duration;

use motorshop_pipeline::bus::{DurableQueue, Publisher, Topic, TopicPublisher};
use motorshop_pipeline::{ManualClock, PipelineConfig};

use crate::support::prospect_event;

#[test]
fn every_subscribed_queue_gets_the_raw_event() {
    let clock = Arc::new(ManualClock::new());
    let topic = Topic::new("model-design");
    let prospects = DurableQueue::new("prospects", &PipelineConfig::default(), clock.clone());
    let audit = DurableQueue::new("audit", &PipelineConfig::default(), clock);
    topic.subscribe(prospects.producer());
    topic.subscribe(audit.producer());

    let publisher = TopicPublisher::new(topic);
    let event = prospect_event("e1", "SuperBike", "2022").with_metadata("source", "factory");
    publisher.publish(event.clone()).unwrap();

    for queue in [&prospects, &audit] {
        let message = queue.receive(1, Duration::ZERO).unwrap().remove(0);
        assert_eq!(message.event.payload, event.payload);
        assert_eq!(message.event.id.as_deref(), Some("e1"));
        assert_eq!(message.event.metadata_value("source"), Some("factory"));
    }
}

#[test]
fn queues_progress_independently() {
    let clock = Arc::new(ManualClock::new());
    let topic = Topic::new("model-design");
    let fast = DurableQueue::new("fast", &PipelineConfig::default(), clock.clone());
    let slow = DurableQueue::new("slow", &PipelineConfig::default(), clock);
    topic.subscribe(fast.producer());
    topic.subscribe(slow.producer());

    TopicPublisher::new(topic)
        .publish(prospect_event("e1", "SuperBike", "2022"))
        .unwrap();

    let message = fast.receive(1, Duration::ZERO).unwrap().remove(0);
    fast.ack(&message.handle).unwrap();

    assert_eq!(fast.depth().unwrap().visible, 0);
    assert_eq!(slow.depth().unwrap().visible, 1);
}

#[test]
fn late_subscriber_misses_earlier_events() {
    let clock = Arc::new(ManualClock::new());
    let topic = Topic::new("model-design");
    let publisher = TopicPublisher::new(topic.clone());

    publisher.publish(prospect_event("e1", "A", "1")).unwrap();

    let queue = DurableQueue::new("late", &PipelineConfig::default(), clock);
    topic.subscribe(queue.producer());
    publisher.publish(prospect_event("e2", "B", "2")).unwrap();

    let messages = queue.receive(10, Duration::ZERO).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event.id.as_deref(), Some("e2"));
}
