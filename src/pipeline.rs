//! Wiring of the motorshop pipeline.
//!
//! ```text
//! POST /models ─▶ CatalogService ─▶ TopicPublisher ─▶ Topic ─▶ prospect-generator queue
//!                      │                                              │
//!                      ▼                                              ▼
//!                 table (catalog)          object store ◀─ ProspectGenerator (worker)
//!
//! POST /orders ─▶ OrderHandler ─▶ table (order)
//! ```

use std::sync::Arc;

use tracing::info;

use crate::bus::{DeadLetterSink, DurableQueue, QueueConsumer, Topic, TopicPublisher};
use crate::catalog::{CatalogService, ProspectGenerator};
use crate::clock::Clock;
use crate::config::{AppConfig, ConfigError};
use crate::order::OrderHandler;
use crate::store::{InMemoryObjectStore, InMemoryTable};
use crate::worker::ConsumerWorker;

/// Name of the queue feeding the prospect generator.
pub const PROSPECT_QUEUE: &str = "prospect-generator";

/// The prospect generator worker as wired by [`Pipeline`].
pub type ProspectWorker = ConsumerWorker<QueueConsumer, ProspectGenerator<InMemoryObjectStore>>;

/// All pipeline components, connected.
///
/// Cloning is cheap; every clone shares the same topic, queue and stores.
#[derive(Clone)]
pub struct Pipeline {
    config: AppConfig,
    topic: Topic,
    publisher: TopicPublisher<Topic>,
    queue: DurableQueue,
    table: InMemoryTable,
    objects: InMemoryObjectStore,
}

impl Pipeline {
    /// Build the topic, the prospect queue with its dead-letter sink, and the
    /// stores, then subscribe the queue to the topic.
    pub fn wire(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.pipeline.validate()?;

        let topic = Topic::new(config.topic_name.clone());
        let queue = DurableQueue::new(PROSPECT_QUEUE, &config.pipeline, clock);
        topic.subscribe(queue.producer());

        info!(
            topic = %config.topic_name,
            queue = PROSPECT_QUEUE,
            dead_letters = queue.dead_letters().name(),
            max_receive_count = config.pipeline.max_receive_count,
            "pipeline wired"
        );

        Ok(Self {
            config: config.clone(),
            publisher: TopicPublisher::new(topic.clone()),
            topic,
            queue,
            table: InMemoryTable::named(config.table_name.clone()),
            objects: InMemoryObjectStore::new(config.bucket_name.clone()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn publisher(&self) -> TopicPublisher<Topic> {
        self.publisher.clone()
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    pub fn consumer(&self) -> QueueConsumer {
        self.queue.consumer()
    }

    pub fn dead_letters(&self) -> DeadLetterSink {
        self.queue.dead_letters()
    }

    pub fn table(&self) -> &InMemoryTable {
        &self.table
    }

    pub fn objects(&self) -> &InMemoryObjectStore {
        &self.objects
    }

    pub fn catalog_service(&self) -> CatalogService<TopicPublisher<Topic>, InMemoryTable> {
        CatalogService::new(
            self.publisher(),
            self.table.clone(),
            self.config.topic_name.clone(),
        )
    }

    pub fn order_handler(&self) -> OrderHandler<InMemoryTable> {
        OrderHandler::new(self.table.clone())
    }

    /// A fresh prospect generator worker bound to the prospect queue.
    pub fn prospect_worker(&self) -> ProspectWorker {
        ConsumerWorker::from_config(
            self.consumer(),
            ProspectGenerator::new(self.objects.clone()),
            &self.config.pipeline,
        )
    }
}
