//! Meeting session endpoints.
//!
//! - POST /meetings/start  — begin a recording session
//! - POST /meetings/stop   — finalize the active session
//! - GET  /meetings/status — consistent status snapshot
//! - GET  /meetings        — list persisted records
//! - GET  /meetings/:id    — fetch one persisted record

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, Default, serde::Deserialize)]
pub struct MeetingStartRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/meetings/start", post(start_meeting))
        .route("/meetings/stop", post(stop_meeting))
        .route("/meetings/status", get(meeting_status))
        .route("/meetings", get(list_meetings))
        .route("/meetings/:id", get(get_meeting))
        .with_state(state)
}

async fn start_meeting(
    State(state): State<ApiState>,
    body: Option<Json<MeetingStartRequest>>,
) -> ApiResult<Json<Value>> {
    let request = body.map(|Json(req)| req).unwrap_or_default();

    info!("Meeting start requested via API");

    let mut orchestrator = state.orchestrator.lock().await;
    let outcome = orchestrator
        .start_meeting(request.title, request.participants)
        .await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": outcome.meeting_id,
        "title": outcome.title,
    })))
}

async fn stop_meeting(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    info!("Meeting stop requested via API");

    let mut orchestrator = state.orchestrator.lock().await;
    let outcome = orchestrator.stop_meeting().await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": outcome.meeting_id,
        "audio_file": outcome.audio_file,
        "meeting_file": outcome.meeting_file,
        "summary": outcome.summary,
        "warning": outcome.warning,
        "duration_seconds": outcome.duration_seconds,
    })))
}

async fn meeting_status(State(state): State<ApiState>) -> Json<Value> {
    let status = state.status.snapshot().await;
    Json(json!({
        "active": status.active,
        "phase": status.phase.as_str(),
        "meeting_id": status.meeting_id,
        "title": status.title,
        "duration_seconds": status.duration_seconds,
        "transcript_length": status.transcript_length,
        "participants": status.participants,
        "limit_reached": status.limit_reached,
        "last_error": status.last_error,
    }))
}

async fn list_meetings(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let persist = state.persist.clone();
    let entries = tokio::task::spawn_blocking(move || persist.list_meeting_records(limit))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({ "meetings": entries })))
}

async fn get_meeting(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<Value>> {
    let persist = state.persist.clone();
    let record = tokio::task::spawn_blocking(move || persist.read_meeting_record(&id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    match record {
        Some(record) => Ok(Json(serde_json::to_value(record).map_err(|e| {
            ApiError::internal(e.to_string())
        })?)),
        None => Err(ApiError::not_found("meeting record not found")),
    }
}
