//! REST API server for meetscribe.
//!
//! Provides HTTP endpoints for:
//! - Meeting control (start, stop, status)
//! - Persisted meeting records
//! - Engine inspection and hot-swap
//! - Audio device listing
//! - Ad-hoc transcription and summarization

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::ApiState;

pub struct ApiServer {
    port: u16,
    state: ApiState,
}

impl ApiServer {
    pub fn new(state: ApiState, port: u16) -> Self {
        Self { port, state }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::meetings::router(self.state.clone()))
            .merge(routes::engines::router(self.state.clone()))
            .merge(routes::devices::router(self.state.clone()))
            .merge(routes::process::router(self.state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                              - Service info");
        info!("  GET  /version                       - Version info");
        info!("  POST /meetings/start                - Start a meeting recording");
        info!("  POST /meetings/stop                 - Stop and finalize the meeting");
        info!("  GET  /meetings/status               - Current session status");
        info!("  GET  /meetings                      - List meeting records");
        info!("  GET  /meetings/:id                  - Get a meeting record");
        info!("  GET  /engines                       - List engines and status");
        info!("  GET  /engines/status                - Current engine status");
        info!("  POST /engines/stt/switch            - Switch STT engine");
        info!("  POST /engines/summarization/switch  - Switch summarization engine");
        info!("  GET  /devices                       - List audio input devices");
        info!("  POST /transcribe                    - Transcribe an audio file");
        info!("  POST /summarize                     - Summarize text");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetscribe",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetscribe"
    }))
}
