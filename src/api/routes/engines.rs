//! Engine inspection and hot-swap endpoints.
//!
//! - GET  /engines                       — registries plus current status
//! - GET  /engines/status                — current engine status only
//! - POST /engines/stt/switch            — swap the STT engine
//! - POST /engines/summarization/switch  — swap the summarization engine

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::ApiResult;

#[derive(Debug, serde::Deserialize)]
pub struct SwitchRequest {
    pub engine: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/engines", get(list_engines))
        .route("/engines/status", get(engine_status))
        .route("/engines/stt/switch", post(switch_stt))
        .route("/engines/summarization/switch", post(switch_summarization))
        .with_state(state)
}

async fn list_engines(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let orchestrator = state.orchestrator.lock().await;
    let status = orchestrator.engine_status().await;

    Ok(Json(json!({
        "stt": {
            "available": orchestrator.list_stt_engines(),
            "current": status.stt,
        },
        "summarization": {
            "available": orchestrator.list_summarization_engines(),
            "current": status.summarization,
        },
    })))
}

async fn engine_status(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let orchestrator = state.orchestrator.lock().await;
    let status = orchestrator.engine_status().await;
    Ok(Json(json!({
        "stt": status.stt,
        "summarization": status.summarization,
    })))
}

async fn switch_stt(
    State(state): State<ApiState>,
    Json(request): Json<SwitchRequest>,
) -> ApiResult<Json<Value>> {
    info!("STT engine switch to '{}' requested", request.engine);
    let orchestrator = state.orchestrator.lock().await;
    let switched = orchestrator.switch_stt_engine(&request.engine).await;

    Ok(Json(json!({
        "success": switched,
        "engine": request.engine,
        "current": orchestrator.engine_status().await.stt,
    })))
}

async fn switch_summarization(
    State(state): State<ApiState>,
    Json(request): Json<SwitchRequest>,
) -> ApiResult<Json<Value>> {
    info!(
        "Summarization engine switch to '{}' requested",
        request.engine
    );
    let orchestrator = state.orchestrator.lock().await;
    let switched = orchestrator
        .switch_summarization_engine(&request.engine)
        .await;

    Ok(Json(json!({
        "success": switched,
        "engine": request.engine,
        "current": orchestrator.engine_status().await.summarization,
    })))
}
