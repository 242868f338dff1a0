//! WebSocket + REST boundary for UI/widget collaborators and raw-item feeds.
//!
//! Collaborators POST raw items in (mail payloads, notification events, OCR
//! text) and read bucket/status-filtered task lists back. `/ws` delivers a
//! snapshot of open tasks on connect and every committed write after it.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::mail::{self, MailProvider};
use crate::channels::notify::{self, NotificationEvent};
use crate::ingest::{
    IncomingItem, IngestCoordinator, IngestOutcome, RetentionPolicy, run_retention,
};
use crate::parse::ocr::TaskDraft;
use crate::store::TaskStore;
use crate::tasks::feed::{TaskEvent, TaskFeed};
use crate::tasks::model::{DueBucket, TaskStatus};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<IngestCoordinator>,
    pub store: Arc<dyn TaskStore>,
    pub feed: Arc<TaskFeed>,
    pub retention: RetentionPolicy,
}

/// Build the Axum router with task WebSocket and REST routes.
pub fn task_routes(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/api/ingest", post(ingest_item))
        .route("/api/ingest/mail", post(ingest_mail))
        .route("/api/ingest/notification", post(ingest_notification))
        .route("/api/ocr/preview", post(ocr_preview))
        .route("/api/ocr/confirm", post(ocr_confirm))
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/{id}/complete", post(complete_task))
        .route("/api/maintenance/retention", post(retention_sweep))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "task-inbox"
    }))
}

// ── Ingestion ───────────────────────────────────────────────────────────

fn outcome_response(outcome: IngestOutcome) -> (StatusCode, Json<serde_json::Value>) {
    match outcome {
        IngestOutcome::Created(task) => (
            StatusCode::OK,
            Json(serde_json::json!({"outcome": "created", "task": task})),
        ),
        IngestOutcome::Skipped => (
            StatusCode::OK,
            Json(serde_json::json!({"outcome": "skipped"})),
        ),
    }
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
}

async fn ingest_item(
    State(state): State<AppState>,
    Json(item): Json<IncomingItem>,
) -> impl IntoResponse {
    match state.coordinator.ingest(item).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => internal_error(e),
    }
}

#[derive(Deserialize)]
struct MailIngestRequest {
    /// "gmail" or "naver".
    account_type: String,
    /// Channel-native message identifier.
    uid: String,
    /// Raw RFC 822 message text.
    raw: String,
}

async fn ingest_mail(
    State(state): State<AppState>,
    Json(body): Json<MailIngestRequest>,
) -> impl IntoResponse {
    let Some(provider) = MailProvider::parse_str(&body.account_type) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Unknown mail provider"})),
        );
    };

    let item = match mail::to_incoming(
        provider.source(),
        &body.uid,
        body.raw.as_bytes(),
        Utc::now(),
    ) {
        Ok(item) => item,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e.to_string()})),
            );
        }
    };

    match state.coordinator.ingest(item).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => internal_error(e),
    }
}

async fn ingest_notification(
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> impl IntoResponse {
    let Some(item) = notify::to_incoming(&event) else {
        debug!(package = %event.package, "Notification not captured");
        return (
            StatusCode::OK,
            Json(serde_json::json!({"outcome": "dropped"})),
        );
    };

    match state.coordinator.ingest(item).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => internal_error(e),
    }
}

// ── OCR ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OcrPreviewRequest {
    text: String,
}

async fn ocr_preview(
    State(state): State<AppState>,
    Json(body): Json<OcrPreviewRequest>,
) -> impl IntoResponse {
    let draft = state.coordinator.preview_ocr(&body.text, Utc::now());
    Json(draft)
}

async fn ocr_confirm(
    State(state): State<AppState>,
    Json(draft): Json<TaskDraft>,
) -> impl IntoResponse {
    match state.coordinator.ingest_ocr_draft(draft, Utc::now()).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => internal_error(e),
    }
}

// ── Queries ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TaskQuery {
    bucket: Option<String>,
    status: Option<String>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> impl IntoResponse {
    let result = match (query.bucket.as_deref(), query.status.as_deref()) {
        (Some(bucket), None) => match DueBucket::parse_str(bucket) {
            Some(bucket) => state.store.list_by_bucket(bucket).await,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "Unknown bucket"})),
                );
            }
        },
        (None, Some(status)) => match TaskStatus::parse_str(status) {
            Some(status) => state.store.list_by_status(status).await,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "Unknown status"})),
                );
            }
        },
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Pass exactly one of bucket or status"})),
            );
        }
    };

    match result {
        Ok(tasks) => (StatusCode::OK, Json(serde_json::json!(tasks))),
        Err(e) => internal_error(e),
    }
}

async fn complete_task(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let task_id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid task ID"})),
            );
        }
    };

    match state.coordinator.complete_task(task_id).await {
        Ok(completed) => (
            StatusCode::OK,
            Json(serde_json::json!({"completed": completed})),
        ),
        Err(e) => internal_error(e),
    }
}

// ── Maintenance ─────────────────────────────────────────────────────────

/// Apply the retention sweeps. Triggered by external scheduling; the core
/// runs no timer of its own.
async fn retention_sweep(State(state): State<AppState>) -> impl IntoResponse {
    match run_retention(state.store.as_ref(), &state.retention, Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "messages_deleted": report.messages_deleted,
                "tasks_deleted": report.tasks_deleted,
            })),
        ),
        Err(e) => internal_error(e),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

/// Actions a client can send over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum TaskAction {
    /// Mark a task as completed.
    Complete { id: Uuid },
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("WebSocket client connected");

    // Send all open tasks on connect
    if !send_sync(&mut socket, &state).await {
        return;
    }

    // Subscribe to broadcast channel for real-time updates
    let mut rx = state.feed.subscribe();

    loop {
        tokio::select! {
            // Forward broadcast events to this client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind broadcast");
                        // Re-sync with a fresh snapshot
                        if !send_sync(&mut socket, &state).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            // Receive actions from client
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &state).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Send a snapshot of open tasks. Returns false if the client is gone.
async fn send_sync(socket: &mut WebSocket, state: &AppState) -> bool {
    let tasks = match state.store.list_open().await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = %e, "Failed to load open tasks for sync");
            Vec::new()
        }
    };
    let sync = TaskEvent::TasksSync { tasks };
    match serde_json::to_string(&sync) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

async fn handle_client_message(text: &str, state: &AppState) {
    match serde_json::from_str::<TaskAction>(text) {
        Ok(TaskAction::Complete { id }) => match state.coordinator.complete_task(id).await {
            Ok(true) => info!(task_id = %id, "Task completed via WS"),
            Ok(false) => debug!(task_id = %id, "Complete via WS was a no-op"),
            Err(e) => warn!(task_id = %id, error = %e, "Complete via WS failed"),
        },
        Err(e) => {
            debug!(error = %e, text = text, "Unrecognized WS message from client");
        }
    }
}
