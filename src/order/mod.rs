//! Order intake: the shop's synchronous entry point.
//!
//! Unlike model designs, orders never touch the bus: the caller gets the
//! outcome in the response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::CatalogEntry;
use crate::error::{Classify, ErrorKind};
use crate::store::{KeyValueStore, Record, RecordsExt, StoreError};

/// Partition holding placed orders.
pub const ORDER_PARTITION: &str = "order";

fn default_quantity() -> u32 {
    1
}

/// Incoming order body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub name: String,
    pub quantity: u32,
    pub placed_at: DateTime<Utc>,
}

impl Record for OrderRecord {
    const PARTITION: &'static str = ORDER_PARTITION;

    fn sort_key(&self) -> String {
        self.order_id.clone()
    }
}

/// Body returned for a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub model: String,
    pub quantity: u32,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order body: {0}")]
    Decode(String),
    #[error("order rejected: {0}")]
    Invalid(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl Classify for OrderError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Decode(_) | OrderError::Invalid(_) | OrderError::UnknownModel(_) => {
                ErrorKind::PoisonMessage
            }
            OrderError::Store(e) => e.kind(),
        }
    }
}

impl OrderError {
    pub fn status_code(&self) -> u16 {
        match self {
            OrderError::Decode(_) => 400,
            OrderError::Invalid(_) => 422,
            OrderError::UnknownModel(_) => 404,
            OrderError::Store(e) if e.kind().is_retryable() => 503,
            OrderError::Store(_) => 500,
        }
    }
}

/// Status plus JSON body, independent of any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub status: u16,
    pub body: Value,
}

/// Places orders against the catalog.
pub struct OrderHandler<T> {
    table: T,
}

impl<T: KeyValueStore> OrderHandler<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Decode a raw request body and place the order.
    pub fn handle_order(&self, body: &[u8]) -> OrderResponse {
        let result = serde_json::from_slice::<OrderRequest>(body)
            .map_err(|e| OrderError::Decode(e.to_string()))
            .and_then(|request| self.place(request));

        match result {
            Ok(confirmation) => OrderResponse {
                status: 200,
                body: json!(confirmation),
            },
            Err(err) => {
                warn!(error = %err, "order failed");
                OrderResponse {
                    status: err.status_code(),
                    body: json!({ "error": err.to_string() }),
                }
            }
        }
    }

    /// Validate, check the catalog, then store the order.
    pub fn place(&self, request: OrderRequest) -> Result<OrderConfirmation, OrderError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(OrderError::Invalid("name must not be empty".into()));
        }
        if request.quantity == 0 {
            return Err(OrderError::Invalid("quantity must be at least 1".into()));
        }

        if self.table.get_record::<CatalogEntry>(name)?.is_none() {
            return Err(OrderError::UnknownModel(name.to_string()));
        }

        let record = OrderRecord {
            order_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            quantity: request.quantity,
            placed_at: Utc::now(),
        };
        self.table.put_record(&record)?;

        info!(order_id = %record.order_id, name = %record.name, quantity = record.quantity, "order placed");

        Ok(OrderConfirmation {
            order_id: record.order_id,
            model: record.name.to_uppercase(),
            quantity: record.quantity,
        })
    }
}
