//! End-to-end tests for the REST API over an in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tempo_engine::config::EngineConfig;
use tempo_engine::engine::TaskEngine;
use tempo_server::rest::create_router;
use tempo_server::state::AppState;
use tempo_storage::SqliteTaskStore;

fn test_router() -> Router {
    tempo_server::metrics::init_metrics();
    let store = SqliteTaskStore::open_in_memory().unwrap();
    let engine = TaskEngine::with_store(Arc::new(store), EngineConfig::default());
    let state = Arc::new(AppState::new(Arc::new(engine)));
    create_router(state)
}

async fn send_json(router: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn send_get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn task_body(title: &str) -> Value {
    json!({
        "title": title,
        "due_at": (Utc::now() + Duration::hours(3)).to_rfc3339(),
    })
}

#[tokio::test]
async fn health_reports_status_and_count() {
    let router = test_router();
    let (status, body) = send_get(&router, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["task_count"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn task_crud_lifecycle() {
    let router = test_router();

    let (status, created) =
        send_json(&router, Method::POST, "/api/v1/tasks", task_body("write report")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "write report");
    assert_eq!(created["priority"], "medium");
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send_get(&router, &format!("/api/v1/tasks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, updated) = send_json(
        &router,
        Method::PUT,
        &format!("/api/v1/tasks/{id}"),
        json!({
            "title": "write the report",
            "description": "quarterly numbers",
            "priority": "high",
            "status": "pending",
            "due_at": (Utc::now() + Duration::hours(5)).to_rfc3339(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "write the report");
    assert_eq!(updated["priority"], "high");

    let (status, list) = send_get(&router, "/api/v1/tasks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, deleted) = send_json(
        &router,
        Method::DELETE,
        &format!("/api/v1/tasks/{id}"),
        Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], true);

    let (status, _) = send_get(&router, &format!("/api/v1/tasks/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let router = test_router();

    let (status, _) =
        send_json(&router, Method::POST, "/api/v1/tasks", json!({
            "title": "   ",
            "due_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&router, Method::POST, "/api/v1/tasks", json!({
        "title": "t",
        "due_at": "next tuesday",
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(&router, Method::POST, "/api/v1/tasks", json!({
        "title": "t",
        "priority": "urgent",
        "due_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_task_is_404_and_bad_id_is_400() {
    let router = test_router();

    let (status, _) = send_get(
        &router,
        "/api/v1/tasks/018f4e6a-0000-7000-8000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_get(&router, "/api/v1/tasks/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_patch_completes_a_task() {
    let router = test_router();
    let (_, created) =
        send_json(&router, Method::POST, "/api/v1/tasks", task_body("finish")).await;
    let id = created["id"].as_str().unwrap();

    let (status, patched) = send_json(
        &router,
        Method::PATCH,
        &format!("/api/v1/tasks/{id}/status"),
        json!({ "status": "completed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["status"], "completed");

    let (status, _) = send_json(
        &router,
        Method::PATCH,
        &format!("/api/v1/tasks/{id}/status"),
        json!({ "status": "archived" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn snooze_pushes_due_date() {
    let router = test_router();
    let (_, created) =
        send_json(&router, Method::POST, "/api/v1/tasks", task_body("call back")).await;
    let id = created["id"].as_str().unwrap();

    let (status, snoozed) = send_json(
        &router,
        Method::POST,
        &format!("/api/v1/tasks/{id}/snooze"),
        json!({ "minutes": 30 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(snoozed["due_at"].as_str().unwrap() > created["due_at"].as_str().unwrap());

    let (status, _) = send_json(
        &router,
        Method::POST,
        &format!("/api/v1/tasks/{id}/snooze"),
        json!({ "minutes": -5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn due_listing_filters_by_cutoff() {
    let router = test_router();
    let overdue = json!({
        "title": "late",
        "due_at": (Utc::now() - Duration::hours(1)).to_rfc3339(),
    });
    send_json(&router, Method::POST, "/api/v1/tasks", overdue).await;
    send_json(&router, Method::POST, "/api/v1/tasks", task_body("future")).await;

    let (status, due) = send_get(&router, "/api/v1/tasks/due").await;
    assert_eq!(status, StatusCode::OK);
    let due = due.as_array().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0]["title"], "late");
}

#[tokio::test]
async fn list_filters_by_status_and_priority() {
    let router = test_router();
    send_json(&router, Method::POST, "/api/v1/tasks", json!({
        "title": "high prio",
        "priority": "high",
        "due_at": (Utc::now() + Duration::hours(1)).to_rfc3339(),
    }))
    .await;
    send_json(&router, Method::POST, "/api/v1/tasks", task_body("medium prio")).await;

    let (status, filtered) = send_get(&router, "/api/v1/tasks?priority=high").await;
    assert_eq!(status, StatusCode::OK);
    let filtered = filtered.as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["title"], "high prio");
}

#[tokio::test]
async fn settings_get_or_create_and_validated_update() {
    let router = test_router();

    let (status, defaults) = send_get(&router, "/api/v1/notifications/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["enabled"], true);
    assert_eq!(defaults["high_priority"], true);
    assert_eq!(defaults["low_priority"], false);
    assert_eq!(defaults["reminder_minutes"], 60);

    let (status, updated) = send_json(
        &router,
        Method::PUT,
        "/api/v1/notifications/settings",
        json!({ "reminder_minutes": 30, "low_priority": true }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["reminder_minutes"], 30);
    assert_eq!(updated["low_priority"], true);

    let (status, _) = send_json(
        &router,
        Method::PUT,
        "/api/v1/notifications/settings",
        json!({ "reminder_minutes": 200 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The rejected update must not have been persisted.
    let (_, current) = send_get(&router, "/api/v1/notifications/settings").await;
    assert_eq!(current["reminder_minutes"], 30);
}

#[tokio::test]
async fn test_notification_endpoint_acknowledges() {
    let router = test_router();
    let (status, body) =
        send_json(&router, Method::POST, "/api/v1/notifications/test", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Test notification sent");
}

#[tokio::test]
async fn subscribe_endpoint_acknowledges() {
    let router = test_router();
    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/v1/notifications/subscribe",
        json!({ "subscription": { "endpoint": "https://example.com/push" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Subscription successful");
}

#[tokio::test]
async fn insights_heuristic_path() {
    let router = test_router();

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/v1/ai/insights",
        json!({ "tasks": [
            {
                "title": "late task",
                "due_at": (Utc::now() - Duration::hours(2)).to_rfc3339(),
                "priority": "high",
                "status": "pending",
            },
            {
                "title": "done task",
                "due_at": (Utc::now() + Duration::hours(2)).to_rfc3339(),
                "priority": "low",
                "status": "completed",
            },
        ] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let analysis = body["data"]["workload_analysis"].as_str().unwrap();
    assert!(analysis.contains("2 tasks in total"));
    assert!(analysis.contains("1 tasks are overdue"));
    assert!(body["data"]["scheduling_suggestions"].is_string());
    assert!(body["data"]["productivity_tips"].is_string());
}

#[tokio::test]
async fn insights_validates_request_shape() {
    let router = test_router();

    let (status, _) =
        send_json(&router, Method::POST, "/api/v1/ai/insights", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send_json(&router, Method::POST, "/api/v1/ai/insights", json!({ "tasks": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &router,
        Method::POST,
        "/api/v1/ai/insights",
        json!({ "tasks": [{ "title": "no due date" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mutations_broadcast_task_events() {
    tempo_server::metrics::init_metrics();
    let store = SqliteTaskStore::open_in_memory().unwrap();
    let engine = TaskEngine::with_store(Arc::new(store), EngineConfig::default());
    let state = Arc::new(AppState::new(Arc::new(engine)));
    let mut rx = state.event_tx.subscribe();
    let router = create_router(Arc::clone(&state));

    let (_, created) =
        send_json(&router, Method::POST, "/api/v1/tasks", task_body("observed")).await;

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, tempo_core::TaskEventKind::TaskCreated);
    assert_eq!(Value::String(event.task_id), created["id"]);
}

#[tokio::test]
async fn metrics_exposition_renders_counters() {
    let router = test_router();
    send_get(&router, "/api/v1/health").await;

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tempo_rest_requests_total"));
    assert!(text.contains("tempo_rest_request_duration_seconds_bucket"));
}
