use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CatalogEntry, CatalogError, Prospect};
use crate::bus::{Event, MessageId, Publisher};
use crate::store::{KeyValueStore, RecordsExt};

/// Returned when a model design has been accepted by the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub message_id: MessageId,
    pub topic: String,
    pub message: String,
}

/// The factory's model-publish entry point.
pub struct CatalogService<P, T> {
    publisher: P,
    table: T,
    topic_name: String,
}

impl<P: Publisher, T: KeyValueStore> CatalogService<P, T> {
    pub fn new(publisher: P, table: T, topic_name: impl Into<String>) -> Self {
        Self {
            publisher,
            table,
            topic_name: topic_name.into(),
        }
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Decode a JSON request body and publish it.
    pub fn publish_model_json(&self, body: &[u8]) -> Result<PublishReceipt, CatalogError> {
        let prospect: Prospect =
            serde_json::from_slice(body).map_err(|e| CatalogError::Decode(e.to_string()))?;
        self.publish_model(prospect)
    }

    /// Record the model in the catalog, then broadcast it.
    ///
    /// Returns as soon as the topic accepts the event. A failed publish
    /// leaves the catalog entry in place; publishing again is safe.
    pub fn publish_model(&self, prospect: Prospect) -> Result<PublishReceipt, CatalogError> {
        prospect.validate().map_err(CatalogError::Invalid)?;

        self.table.put_record(&CatalogEntry::from(&prospect))?;

        let event = Event::json(&prospect)
            .map_err(|e| CatalogError::Decode(e.to_string()))?
            .with_metadata("content-type", "application/json");
        let message_id = self.publisher.publish(event)?;

        info!(
            name = %prospect.name,
            model = %prospect.model,
            message_id = %message_id,
            topic = %self.topic_name,
            "model published"
        );

        Ok(PublishReceipt {
            message_id,
            topic: self.topic_name.clone(),
            message: format!("Message put in {}", self.topic_name),
        })
    }
}
