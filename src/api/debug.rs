use super::AppState;
use crate::models::debug::DebugEvent;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn list_events(State(state): State<AppState>) -> Json<Vec<DebugEvent>> {
    Json(state.debug.events())
}

pub async fn clear_events(State(state): State<AppState>) -> StatusCode {
    state.debug.clear();
    StatusCode::NO_CONTENT
}
