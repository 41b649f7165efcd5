//! Pipeline and application configuration.
//!
//! Policy values are plain data handed to components at construction.
//! Nothing is discovered at runtime; `AppConfig::from_env` is the only
//! place that reads the process environment.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Delivery policy for a queue and its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deliveries allowed before a message is moved to the dead-letter sink.
    pub max_receive_count: u32,
    /// How long dead-lettered messages are kept before being purged.
    pub dlq_retention_days: u32,
    /// Messages taken per dequeue.
    pub batch_size: usize,
    /// How long a dequeued message stays hidden from other consumers.
    pub visibility_timeout_secs: u64,
    /// Long-poll wait when the queue is empty.
    pub poll_timeout_ms: u64,
    /// Identifier used in worker logs.
    pub worker_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_receive_count: 3,
            dlq_retention_days: 1,
            batch_size: 1,
            visibility_timeout_secs: 30,
            poll_timeout_ms: 1_000,
            worker_id: format!("worker-{}", std::process::id()),
        }
    }
}

impl PipelineConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn dlq_retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.dlq_retention_days) * 24 * 60 * 60)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Reject values that would make the pipeline stall or spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_receive_count == 0 {
            return Err(ConfigError::Invalid(
                "max_receive_count must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.visibility_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "visibility_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the `motorshop` binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub http_addr: String,
    pub bucket_name: String,
    pub table_name: String,
    pub topic_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            http_addr: "0.0.0.0:3000".to_string(),
            bucket_name: "motorshop-bucket".to_string(),
            table_name: "motorshop-table".to_string(),
            topic_name: "model-design".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("MOTORSHOP_HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Some(bucket) = lookup("BUCKET_NAME") {
            config.bucket_name = bucket;
        }
        if let Some(table) = lookup("DYNAMO_TABLE") {
            config.table_name = table;
        }
        if let Some(topic) = lookup("SNS_TOPIC_NAME") {
            config.topic_name = topic;
        }

        let pipeline = &mut config.pipeline;
        if let Some(v) = parse_var(&lookup, "MOTORSHOP_MAX_RECEIVE_COUNT")? {
            pipeline.max_receive_count = v;
        }
        if let Some(v) = parse_var(&lookup, "MOTORSHOP_DLQ_RETENTION_DAYS")? {
            pipeline.dlq_retention_days = v;
        }
        if let Some(v) = parse_var(&lookup, "MOTORSHOP_BATCH_SIZE")? {
            pipeline.batch_size = v;
        }
        if let Some(v) = parse_var(&lookup, "MOTORSHOP_VISIBILITY_TIMEOUT_SECS")? {
            pipeline.visibility_timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MOTORSHOP_POLL_TIMEOUT_MS")? {
            pipeline.poll_timeout_ms = v;
        }
        if let Some(id) = lookup("MOTORSHOP_WORKER_ID") {
            pipeline.worker_id = id;
        }

        config.pipeline.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
