//! At-least-once event pipeline for the motorshop catalog and order services.
//!
//! A model design published by the factory is written to the catalog table
//! and broadcast on a topic. The topic delivers it, unwrapped, into a durable
//! queue. A consumer worker turns each message into a prospect sheet in the
//! object store. Messages that fail too often move to a dead-letter sink.
//! Orders are handled synchronously against the catalog.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use motorshop_pipeline::{AppConfig, ManualClock, Pipeline};
//!
//! let pipeline = Pipeline::wire(&AppConfig::default(), Arc::new(ManualClock::new())).unwrap();
//! pipeline
//!     .catalog_service()
//!     .publish_model_json(br#"{"name":"SuperBike","model":"2022"}"#)
//!     .unwrap();
//!
//! let worker = pipeline.prospect_worker().with_poll_timeout(Duration::ZERO);
//! assert_eq!(worker.run_once().unwrap().acked, 1);
//! ```

pub mod bus;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod order;
pub mod pipeline;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, PipelineConfig};
pub use error::{Classify, ErrorKind};
pub use pipeline::{Pipeline, ProspectWorker, PROSPECT_QUEUE};
pub use telemetry::{init_logging, init_logging_with};
