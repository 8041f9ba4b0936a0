//! REST transport over `BugService`.

pub mod bugs;
pub mod debug;
pub mod settings;

use crate::debug::{DebugLog, DebugSink};
use crate::error::BugError;
use crate::models::debug::{DebugEvent, DebugLevel};
use crate::rules::validate::format_errors;
use crate::service::BugService;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub service: BugService,
    pub debug: Arc<DebugLog>,
    pub data_dir: PathBuf,
}

impl AppState {
    pub fn new(service: BugService, debug: Arc<DebugLog>, data_dir: PathBuf) -> Self {
        Self {
            service,
            debug,
            data_dir,
        }
    }

    /// Convert a service outcome for the wire, noting failures in the debug log.
    fn observe<T>(&self, result: Result<T, BugError>) -> Result<T, ApiError> {
        result.map_err(|err| {
            let event = match &err {
                BugError::Validation(errors) => Some(
                    DebugEvent::new(DebugLevel::Warn, "validation", format_errors(errors))
                        .with_details(json!(errors)),
                ),
                BugError::Storage(message) => {
                    Some(DebugEvent::new(DebugLevel::Error, "storage", message.clone()))
                }
                BugError::NotFound(_) => None,
            };
            if let Some(event) = event {
                self.debug.record(event);
            }
            ApiError(err)
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/bugs", get(bugs::list_bugs).post(bugs::create_bug))
        .route(
            "/api/bugs/{id}",
            get(bugs::get_bug).put(bugs::update_bug).delete(bugs::delete_bug),
        )
        .route("/api/bugs/{id}/status", patch(bugs::transition_bug))
        .route("/api/bugs/{id}/actions", get(bugs::list_actions))
        .route(
            "/api/debug/events",
            get(debug::list_events).delete(debug::clear_events),
        )
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::save_settings),
        )
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

/// Unreadable bodies (bad JSON, wrong content type, non-object) are reported
/// as a `body` validation error.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, BugError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| BugError::field("body", rejection.body_text()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// One debug event per API request. Requests for the debug log itself are
/// not recorded.
async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    log::debug!("{method} {path} -> {} in {elapsed_ms}ms", status.as_u16());

    if !path.starts_with("/api/debug") {
        let level = if status.is_server_error() {
            DebugLevel::Error
        } else if status.is_client_error() {
            DebugLevel::Warn
        } else {
            DebugLevel::Info
        };
        state.debug.record(
            DebugEvent::new(level, "http", format!("{method} {path} -> {}", status.as_u16()))
                .with_details(json!({
                    "method": method.as_str(),
                    "path": path,
                    "status": status.as_u16(),
                    "durationMs": elapsed_ms,
                })),
        );
    }

    response
}

#[derive(Debug)]
pub struct ApiError(pub BugError);

impl From<BugError> for ApiError {
    fn from(err: BugError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            BugError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation",
                    "message": format_errors(errors),
                    "errors": errors,
                }),
            ),
            BugError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "not_found", "message": format!("Bug {id} not found") }),
            ),
            BugError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "storage", "message": "storage failure" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
