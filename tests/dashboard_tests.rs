use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use dispatch_sim::config::SimulationConfig;
use dispatch_sim::dashboard::{router, DashboardState};
use dispatch_sim::simulation::Simulation;

/// Create a test app over a simulation that is never ticked
fn create_test_app(workers: usize) -> (Router, Simulation) {
    let simulation =
        Simulation::new(SimulationConfig::default().with_initial_workers(workers)).unwrap();
    let state = DashboardState {
        simulation: simulation.handle(),
    };
    (router(state), simulation)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_state_endpoint_empty() {
    let (app, _sim) = create_test_app(0);

    let (status, body) = send(&app, "GET", "/api/state", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticks"], 0);
    assert_eq!(body["workers"], json!([]));
    assert_eq!(body["pending"], json!([]));
    assert_eq!(body["in_progress"], json!([]));
    assert_eq!(body["completed"], json!([]));
}

#[tokio::test]
async fn test_create_orders_respects_priority() {
    let (app, _sim) = create_test_app(0);

    let (status, body) = send(
        &app,
        "POST",
        "/api/orders",
        Some(json!({"priority": "normal"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["job_id"], "#10000");

    let (_, body) = send(&app, "POST", "/api/orders", Some(json!({"priority": "vip"}))).await;
    assert_eq!(body["job_id"], "#10001");

    let (status, pending) = send(&app, "GET", "/api/orders/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = pending
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["#10001", "#10000"]);
}

#[tokio::test]
async fn test_invalid_priority_rejected() {
    let (app, _sim) = create_test_app(0);

    let (status, _) = send(&app, "POST", "/api/orders", Some(json!({"priority": "urgent"}))).await;
    assert!(status.is_client_error());

    let (_, pending) = send(&app, "GET", "/api/orders/pending", None).await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn test_add_worker_picks_up_order() {
    let (app, _sim) = create_test_app(0);
    send(&app, "POST", "/api/orders", Some(json!({"priority": "vip"}))).await;

    let (status, body) = send(&app, "POST", "/api/workers", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["worker_id"], "Bot #1");

    let (_, workers) = send(&app, "GET", "/api/workers", None).await;
    assert_eq!(workers[0]["status"], "Busy");
    assert_eq!(workers[0]["current_job"], "#10000");
    assert_eq!(workers[0]["remaining_ticks"], 10);

    let (_, in_progress) = send(&app, "GET", "/api/orders/in-progress", None).await;
    assert_eq!(in_progress[0]["assigned_worker"], "Bot #1");
}

#[tokio::test]
async fn test_remove_last_worker_rolls_back() {
    let (app, _sim) = create_test_app(1);
    send(&app, "POST", "/api/orders", Some(json!({"priority": "normal"}))).await;

    let (status, body) = send(&app, "DELETE", "/api/workers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["worker"], "Bot #1");
    assert_eq!(body["rolled_back"], "#10000");

    let (_, pending) = send(&app, "GET", "/api/orders/pending", None).await;
    assert_eq!(pending[0]["id"], "#10000");
    assert_eq!(pending[0]["state"], "Pending");
    assert_eq!(pending[0]["rollbacks"], 1);
}

#[tokio::test]
async fn test_remove_from_empty_pool_is_no_content() {
    let (app, _sim) = create_test_app(0);

    let (status, body) = send(&app, "DELETE", "/api/workers", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_remove_worker_by_id() {
    let (app, _sim) = create_test_app(2);

    let (status, body) = send(&app, "DELETE", "/api/workers/bot-1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not the last worker"));

    let (status, _) = send(&app, "DELETE", "/api/workers/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/api/workers/robot", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "DELETE", "/api/workers/bot-2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["worker"], "Bot #2");
    assert_eq!(body["rolled_back"], Value::Null);

    let (_, workers) = send(&app, "GET", "/api/workers", None).await;
    assert_eq!(workers.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_completed_orders_empty_without_ticks() {
    let (app, _sim) = create_test_app(1);
    send(&app, "POST", "/api/orders", Some(json!({"priority": "normal"}))).await;

    let (status, completed) = send(&app, "GET", "/api/orders/completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed, json!([]));
}
