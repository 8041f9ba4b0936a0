use super::{json_body, ApiError, AppState};
use crate::models::bug::{BugFilter, BugPatch, BugPayload, BugRecord, BugStatus, StatusAction};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub action: StatusAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionsResponse {
    pub id: String,
    pub status: BugStatus,
    pub actions: Vec<StatusAction>,
}

pub async fn list_bugs(
    State(state): State<AppState>,
    Query(filter): Query<BugFilter>,
) -> Result<Json<Vec<BugRecord>>, ApiError> {
    let bugs = state.observe(state.service.list(filter).await)?;
    Ok(Json(bugs))
}

pub async fn create_bug(
    State(state): State<AppState>,
    payload: Result<Json<BugPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<BugRecord>), ApiError> {
    let payload = state.observe(json_body(payload))?;
    let bug = state.observe(state.service.create(payload).await)?;
    Ok((StatusCode::CREATED, Json(bug)))
}

pub async fn get_bug(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BugRecord>, ApiError> {
    let bug = state.observe(state.service.get(&id).await)?;
    Ok(Json(bug))
}

pub async fn list_actions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionsResponse>, ApiError> {
    let (bug, actions) = state.observe(state.service.available_actions(&id).await)?;
    Ok(Json(ActionsResponse {
        id: bug.id,
        status: bug.status,
        actions,
    }))
}

pub async fn update_bug(
    State(state): State<AppState>,
    Path(id): Path<String>,
    patch: Result<Json<BugPatch>, JsonRejection>,
) -> Result<Json<BugRecord>, ApiError> {
    let patch = state.observe(json_body(patch))?;
    let bug = state.observe(state.service.update(&id, patch).await)?;
    Ok(Json(bug))
}

pub async fn transition_bug(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<BugRecord>, ApiError> {
    let request = state.observe(json_body(request))?;
    let bug = state.observe(state.service.transition(&id, request.action).await)?;
    Ok(Json(bug))
}

pub async fn delete_bug(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.observe(state.service.delete(&id).await)?;
    Ok(StatusCode::NO_CONTENT)
}
