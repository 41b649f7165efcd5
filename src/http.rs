//! HTTP transport: the factory and shop entry points.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /models`: publish a model design. Body = `{"name", "model"}`.
//! - `POST /orders`: place an order. Body = `{"name", "quantity"?}`.
//! - `GET /health`: `{ "ok": true, "queue_depth": n, "dead_letters": n }`.
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = Pipeline::wire(&config, Arc::new(SystemClock))?;
//! let state = Arc::new(http::AppState::new(&pipeline));
//!
//! // Get the router to compose with other axum routes
//! let app = http::router(state.clone());
//!
//! // Or serve directly
//! http::serve(state, "0.0.0.0:3000").await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::bus::{DeadLetterSink, DurableQueue, QueueError, Topic, TopicPublisher};
use crate::catalog::{CatalogError, CatalogService};
use crate::order::OrderHandler;
use crate::pipeline::Pipeline;
use crate::store::InMemoryTable;

/// Shared state behind the router.
pub struct AppState {
    catalog: CatalogService<TopicPublisher<Topic>, InMemoryTable>,
    orders: OrderHandler<InMemoryTable>,
    queue: DurableQueue,
    dead_letters: DeadLetterSink,
}

impl AppState {
    pub fn new(pipeline: &Pipeline) -> Self {
        Self {
            catalog: pipeline.catalog_service(),
            orders: pipeline.order_handler(),
            queue: pipeline.queue().clone(),
            dead_letters: pipeline.dead_letters(),
        }
    }
}

/// Error rendered as `{"error": "..."}` with a mapped status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Catalog(e) => e.status_code(),
            ApiError::Queue(_) => 503,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build an axum `Router` over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/models", post(publish_model_handler))
        .route("/orders", post(order_handler))
        .with_state(state)
}

/// Serve at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    state: Arc<AppState>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[tracing::instrument(skip_all)]
async fn health_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let depth = state.queue.depth()?;
    let dead_letters = state.dead_letters.len()?;
    Ok(Json(json!({
        "ok": true,
        "queue_depth": depth.visible + depth.in_flight,
        "dead_letters": dead_letters,
    })))
}

#[tracing::instrument(skip_all, fields(bytes = body.len()))]
async fn publish_model_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.catalog.publish_model_json(&body)?;
    Ok((StatusCode::OK, Json(receipt)))
}

#[tracing::instrument(skip_all, fields(bytes = body.len()))]
async fn order_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let response = state.orders.handle_order(&body);
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}
