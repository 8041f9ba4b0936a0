use super::{ApiError, AppState};
use crate::error::BugError;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

/// Current settings file contents. Changes apply on the next start.
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let settings = crate::settings::load_settings_from_disk(&state.data_dir).map_err(BugError::Storage)?;
    Ok(Json(settings))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(settings): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let saved = crate::settings::save_settings_to_disk(&state.data_dir, settings).map_err(BugError::Storage)?;
    Ok(Json(saved))
}
