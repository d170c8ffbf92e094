//! REST API for tasks, notification settings, and AI insights.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tempo_core::{
    NotificationSettings, Priority, Task, TaskEventKind, TaskFilters, TaskStatus, TempoError,
};
use tempo_engine::engine::{CreateTask, UpdateTask};
use tempo_engine::insights::{self, TaskInsights};

use crate::metrics::{metrics_handler, metrics_middleware};
use crate::state::AppState;
use crate::ws::ws_handler;

const DEFAULT_LIST_LIMIT: usize = 500;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/api/v1/tasks/due", get(due_tasks_handler))
        .route(
            "/api/v1/tasks/:id",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        )
        .route("/api/v1/tasks/:id/status", patch(set_status_handler))
        .route("/api/v1/tasks/:id/snooze", post(snooze_handler))
        .route(
            "/api/v1/notifications/settings",
            get(get_settings_handler).put(update_settings_handler),
        )
        .route("/api/v1/notifications/test", post(test_notification_handler))
        .route("/api/v1/notifications/subscribe", post(subscribe_handler))
        .route("/api/v1/notifications/ws", get(ws_handler))
        .route("/api/v1/ai/insights", post(ai_insights_handler))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Same as [`create_router`], with a CORS layer when any origins are
/// configured.
pub fn create_router_with_cors(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let router = create_router(state);
    match build_cors_layer(allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn build_cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }
    let origins: Vec<header::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

// ---------------------------------------------------------------------------
// Error translation & parsing helpers
// ---------------------------------------------------------------------------

fn map_tempo_error(err: TempoError) -> (StatusCode, String) {
    let status = match &err {
        TempoError::TaskNotFound(_) => StatusCode::NOT_FOUND,
        TempoError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

fn parse_uuid_param(raw: &str) -> Result<Uuid, (StatusCode, String)> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("invalid task id: {raw}")))
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, (StatusCode, String)> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| bad_request(format!("invalid RFC3339 datetime: {raw}")))
}

fn parse_priority(raw: &str) -> Result<Priority, (StatusCode, String)> {
    Priority::from_str(raw).map_err(|e| bad_request(e))
}

fn parse_status(raw: &str) -> Result<TaskStatus, (StatusCode, String)> {
    TaskStatus::from_str(raw).map_err(|e| bad_request(e))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    task_count: usize,
    version: String,
}

async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let task_count = state.engine.task_count().await.map_err(map_tempo_error)?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        task_count,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    priority: Option<String>,
    due_at: String,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    title: String,
    description: Option<String>,
    priority: String,
    status: String,
    due_at: String,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SnoozeRequest {
    minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListTasksQuery {
    status: Option<String>,
    priority: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DueTasksQuery {
    before: Option<String>,
}

async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let filters = TaskFilters {
        status: query.status.as_deref().map(parse_status).transpose()?,
        priority: query.priority.as_deref().map(parse_priority).transpose()?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let tasks = state
        .engine
        .list_tasks(&filters, limit, offset)
        .await
        .map_err(map_tempo_error)?;
    Ok(Json(tasks))
}

async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let due_at = parse_rfc3339(&request.due_at)?;
    let priority = request.priority.as_deref().map(parse_priority).transpose()?;
    let task = state
        .engine
        .create_task(CreateTask {
            title: request.title,
            description: request.description,
            priority,
            due_at,
        })
        .await
        .map_err(map_tempo_error)?;

    state.notify_event(TaskEventKind::TaskCreated, task.id, Some(task.clone()));
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let id = parse_uuid_param(&id)?;
    let task = state.engine.get_task(id).await.map_err(map_tempo_error)?;
    Ok(Json(task))
}

async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let id = parse_uuid_param(&id)?;
    let update = UpdateTask {
        title: request.title,
        description: request.description.unwrap_or_default(),
        priority: parse_priority(&request.priority)?,
        status: parse_status(&request.status)?,
        due_at: parse_rfc3339(&request.due_at)?,
    };
    let task = state
        .engine
        .update_task(id, update)
        .await
        .map_err(map_tempo_error)?;

    state.notify_event(TaskEventKind::TaskUpdated, task.id, Some(task.clone()));
    Ok(Json(task))
}

async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let id = parse_uuid_param(&id)?;
    let deleted = state.engine.delete_task(id).await.map_err(map_tempo_error)?;
    if !deleted {
        return Err(map_tempo_error(TempoError::TaskNotFound(id)));
    }
    state.notify_event(TaskEventKind::TaskDeleted, id, None);
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn set_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let id = parse_uuid_param(&id)?;
    let status = parse_status(&request.status)?;
    let task = state
        .engine
        .set_task_status(id, status)
        .await
        .map_err(map_tempo_error)?;

    state.notify_event(TaskEventKind::TaskStatusUpdated, task.id, Some(task.clone()));
    Ok(Json(task))
}

async fn snooze_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SnoozeRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let id = parse_uuid_param(&id)?;
    let task = state
        .engine
        .snooze_reminder(id, request.minutes)
        .await
        .map_err(map_tempo_error)?;

    state.notify_event(TaskEventKind::TaskUpdated, task.id, Some(task.clone()));
    Ok(Json(task))
}

async fn due_tasks_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DueTasksQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let before = match query.before.as_deref() {
        Some(raw) => parse_rfc3339(raw)?,
        None => Utc::now(),
    };
    let tasks = state
        .engine
        .due_tasks(before)
        .await
        .map_err(map_tempo_error)?;
    Ok(Json(tasks))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SettingsRequest {
    enabled: Option<bool>,
    high_priority: Option<bool>,
    medium_priority: Option<bool>,
    low_priority: Option<bool>,
    reminder_minutes: Option<u32>,
}

async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NotificationSettings>, (StatusCode, String)> {
    let settings = state
        .engine
        .notification_settings()
        .await
        .map_err(map_tempo_error)?;
    Ok(Json(settings))
}

async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<NotificationSettings>, (StatusCode, String)> {
    let mut settings = state
        .engine
        .notification_settings()
        .await
        .map_err(map_tempo_error)?;

    if let Some(enabled) = request.enabled {
        settings.enabled = enabled;
    }
    if let Some(high) = request.high_priority {
        settings.high_priority = high;
    }
    if let Some(medium) = request.medium_priority {
        settings.medium_priority = medium;
    }
    if let Some(low) = request.low_priority {
        settings.low_priority = low;
    }
    if let Some(minutes) = request.reminder_minutes {
        settings.reminder_minutes = minutes;
    }

    let saved = state
        .engine
        .update_settings(settings)
        .await
        .map_err(map_tempo_error)?;
    Ok(Json(saved))
}

async fn test_notification_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.notify_notification(tempo_core::Notification::test());
    Ok(Json(serde_json::json!({ "message": "Test notification sent" })))
}

async fn subscribe_handler(
    State(_state): State<Arc<AppState>>,
    Json(_subscription): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    // Subscription payloads are acknowledged but not persisted; delivery
    // happens over the WebSocket stream and webhooks.
    Ok(Json(serde_json::json!({ "message": "Subscription successful" })))
}

// ---------------------------------------------------------------------------
// AI insights
// ---------------------------------------------------------------------------

async fn ai_insights_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let tasks = parse_insight_tasks(&body)?;

    let insights = match state.engine.llm.as_deref() {
        Some(llm) => match insights::llm_insights(llm, &tasks).await {
            Ok(insights) => insights,
            Err(err) => {
                tracing::warn!(error = %err, "LLM insights failed, using heuristic analysis");
                insights::heuristic_insights(&tasks, Utc::now())
            }
        },
        None => insights::heuristic_insights(&tasks, Utc::now()),
    };

    Ok(Json(insights_response(&insights)))
}

fn insights_response(insights: &TaskInsights) -> serde_json::Value {
    serde_json::json!({ "success": true, "data": insights })
}

/// Validate the submitted task list and convert it into engine tasks.
fn parse_insight_tasks(body: &serde_json::Value) -> Result<Vec<Task>, (StatusCode, String)> {
    let entries = match body.get("tasks") {
        Some(serde_json::Value::Array(entries)) => entries,
        _ => {
            return Err(bad_request(
                "Please provide an array of tasks for analysis",
            ))
        }
    };
    if entries.is_empty() {
        return Err(bad_request(
            "Please provide at least one task for analysis",
        ));
    }

    let mut tasks = Vec::with_capacity(entries.len());
    for entry in entries {
        let title = entry.get("title").and_then(|v| v.as_str());
        let due_at = entry.get("due_at").and_then(|v| v.as_str());
        let priority = entry.get("priority").and_then(|v| v.as_str());
        let status = entry.get("status").and_then(|v| v.as_str());

        let (Some(title), Some(due_at), Some(priority), Some(status)) =
            (title, due_at, priority, status)
        else {
            return Err(bad_request(
                "Some tasks are missing required fields. Each task must have: \
                 title, due_at, priority, and status.",
            ));
        };

        let mut task = Task::new(title, parse_rfc3339(due_at)?)
            .with_priority(parse_priority(priority)?)
            .with_status(parse_status(status)?);
        if let Some(description) = entry.get("description").and_then(|v| v.as_str()) {
            task.description = description.to_string();
        }
        tasks.push(task);
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_picks_status_codes() {
        let (status, _) = map_tempo_error(TempoError::TaskNotFound(Uuid::now_v7()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = map_tempo_error(TempoError::InvalidInput("bad".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = map_tempo_error(TempoError::Storage("io".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rfc3339_parsing_is_strict() {
        assert!(parse_rfc3339("2026-08-28T12:00:00Z").is_ok());
        assert!(parse_rfc3339("tomorrow").is_err());
        assert!(parse_rfc3339("2026-08-28").is_err());
    }

    #[test]
    fn insight_tasks_require_all_fields() {
        let missing = serde_json::json!({ "tasks": [{ "title": "t" }] });
        let err = parse_insight_tasks(&missing).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("missing required fields"));

        let empty = serde_json::json!({ "tasks": [] });
        let err = parse_insight_tasks(&empty).unwrap_err();
        assert!(err.1.contains("at least one task"));

        let absent = serde_json::json!({});
        let err = parse_insight_tasks(&absent).unwrap_err();
        assert!(err.1.contains("array of tasks"));

        let valid = serde_json::json!({ "tasks": [{
            "title": "write report",
            "due_at": "2026-08-28T12:00:00Z",
            "priority": "high",
            "status": "pending",
        }] });
        let tasks = parse_insight_tasks(&valid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, Priority::High);
    }

    #[test]
    fn cors_layer_only_builds_with_valid_origins() {
        assert!(build_cors_layer(&[]).is_none());
        assert!(build_cors_layer(&["not an origin\u{0}".to_string()]).is_none());
        assert!(build_cors_layer(&["http://localhost:5173".to_string()]).is_some());
    }
}
