//! Ad-hoc processing endpoints, independent of any meeting session.
//!
//! - POST /transcribe — run the current STT engine on an audio file
//! - POST /summarize  — run the current summarization engine on text

use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::path::PathBuf;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};

#[derive(Debug, serde::Deserialize)]
pub struct TranscribeRequest {
    pub path: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/summarize", post(summarize))
        .with_state(state)
}

async fn transcribe(
    State(state): State<ApiState>,
    Json(request): Json<TranscribeRequest>,
) -> ApiResult<Json<Value>> {
    if !request.path.exists() {
        return Err(ApiError::not_found(format!(
            "audio file not found: {:?}",
            request.path
        )));
    }

    let orchestrator = state.orchestrator.lock().await;
    let result = orchestrator.transcribe_file(&request.path).await?;

    Ok(Json(json!({
        "success": true,
        "text": result.text,
        "confidence": result.confidence,
        "language": result.language,
        "segments": result.segments,
    })))
}

async fn summarize(
    State(state): State<ApiState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Json<Value>> {
    let orchestrator = state.orchestrator.lock().await;
    let summary = orchestrator.summarize_text(&request.text).await?;

    Ok(Json(json!({
        "success": true,
        "summary": summary.summary,
        "key_points": summary.key_points,
        "action_items": summary.action_items,
    })))
}
