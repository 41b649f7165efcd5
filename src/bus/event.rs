//! The unit of publication.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a message when it is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published event.
///
/// The payload is opaque and travels byte-for-byte from publisher to
/// consumer. `id` and `published_at` are filled in by the publisher when
/// the producer leaves them unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub payload: Vec<u8>,
    /// Message attributes (correlation IDs, content type, ...). Delivered
    /// alongside the payload, never folded into it.
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl Event {
    /// Create an event with no id; the publisher assigns one.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: None,
            published_at: None,
            payload: payload.into(),
            metadata: Vec::new(),
        }
    }

    /// Create an event with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(payload)
        }
    }

    /// Create an event whose payload is `value` serialized as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?))
    }

    /// Add a message attribute.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Look up a message attribute.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the payload as JSON.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }

    /// The payload as a string, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Fill in `id` and `published_at` if they are missing.
    pub(crate) fn stamp(&mut self) {
        if self.id.as_deref().map_or(true, str::is_empty) {
            self.id = Some(Uuid::new_v4().to_string());
        }
        if self.published_at.is_none() {
            self.published_at = Some(Utc::now());
        }
    }
}
