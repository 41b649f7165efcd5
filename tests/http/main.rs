//! HTTP transport integration tests.
//!
//! Starts an axum server and exercises it with reqwest.

#![cfg(feature = "http")]

use std::sync::Arc;
use std::time::Duration;

use motorshop_pipeline::http::{self, AppState};
use motorshop_pipeline::{AppConfig, ManualClock, Pipeline};
use serde_json::{json, Value};

fn test_pipeline() -> Pipeline {
    Pipeline::wire(&AppConfig::default(), Arc::new(ManualClock::new())).unwrap()
}

/// Bind to port 0 and return the actual address.
async fn start_server(pipeline: &Pipeline) -> String {
    let app = http::router(Arc::new(AppState::new(pipeline)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_check() {
    let pipeline = test_pipeline();
    let base = start_server(&pipeline).await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "queue_depth": 0, "dead_letters": 0 }));
}

#[tokio::test]
async fn publish_model_enqueues_for_the_generator() {
    let pipeline = test_pipeline();
    let base = start_server(&pipeline).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/models"))
        .json(&json!({ "name": "SuperBike", "model": "2022" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Message put in model-design");
    assert_eq!(body["topic"], "model-design");
    assert!(body["message_id"].is_string());

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["queue_depth"], 1);

    let worker = pipeline.prospect_worker().with_poll_timeout(Duration::ZERO);
    let result = tokio::task::spawn_blocking(move || worker.run_once().unwrap())
        .await
        .unwrap();
    assert_eq!(result.acked, 1);
}

#[tokio::test]
async fn publish_model_rejects_bad_bodies() {
    let pipeline = test_pipeline();
    let base = start_server(&pipeline).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/models"))
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = client
        .post(format!("{base}/models"))
        .json(&json!({ "name": "", "model": "2022" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn unreachable_topic_is_503() {
    let pipeline = test_pipeline();
    pipeline.topic().set_reachable(false);
    let base = start_server(&pipeline).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/models"))
        .json(&json!({ "name": "SuperBike", "model": "2022" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn orders() {
    let pipeline = test_pipeline();
    let base = start_server(&pipeline).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders"))
        .json(&json!({ "name": "SuperBike" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    client
        .post(format!("{base}/models"))
        .json(&json!({ "name": "SuperBike", "model": "2022" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/orders"))
        .json(&json!({ "name": "SuperBike", "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["model"], "SUPERBIKE");
    assert_eq!(body["quantity"], 2);

    let resp = client
        .post(format!("{base}/orders"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
