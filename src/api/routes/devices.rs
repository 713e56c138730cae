//! Audio device listing endpoint.

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use super::ApiState;
use crate::api::error::ApiResult;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/devices", get(list_devices))
        .with_state(state)
}

async fn list_devices(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let orchestrator = state.orchestrator.lock().await;
    let devices = orchestrator.list_input_devices()?;
    Ok(Json(json!({ "devices": devices })))
}
