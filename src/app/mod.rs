//! Service wiring: config → capture backend → engine managers →
//! persistence → orchestrator → API server.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::{ApiServer, ApiState};
use crate::audio::CpalBackend;
use crate::config::Config;
use crate::error::CoreError;
use crate::global;
use crate::meeting::MeetingSessionOrchestrator;
use crate::persist::PersistenceLayer;

pub async fn run_service() -> Result<()> {
    info!("Starting meetscribe service");

    let config = Config::load()?;

    let persist = Arc::new(PersistenceLayer::new(
        global::meetings_dir()?,
        global::db_file()?,
    )?);
    let backend = Arc::new(CpalBackend::new());

    let orchestrator =
        MeetingSessionOrchestrator::new(&config, backend, persist.clone()).await;
    let status = orchestrator.status_handle();
    let orchestrator = Arc::new(Mutex::new(orchestrator));

    let api_server = ApiServer::new(
        ApiState {
            orchestrator: orchestrator.clone(),
            status: status.clone(),
            persist,
        },
        config.api.port,
    );
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    spawn_duration_supervisor(orchestrator.clone());

    info!("meetscribe is ready");
    info!(
        "Start a meeting with: curl -X POST http://127.0.0.1:{}/meetings/start",
        config.api.port
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    orchestrator.lock().await.shutdown().await;

    Ok(())
}

/// Stops the active session once its max-duration deadline fires. Wakes on
/// the status handle's notification rather than polling.
fn spawn_duration_supervisor(orchestrator: Arc<Mutex<MeetingSessionOrchestrator>>) {
    tokio::spawn(async move {
        loop {
            let status = orchestrator.lock().await.status_handle();
            status.limit_reached().await;

            warn!("Maximum meeting duration reached, stopping the session");
            let mut orchestrator = orchestrator.lock().await;
            match orchestrator.stop_meeting().await {
                Ok(outcome) => info!(
                    "Meeting {} stopped at the duration limit",
                    outcome.meeting_id
                ),
                // The user beat us to it; nothing to do.
                Err(CoreError::NoActiveSession) => {}
                Err(e) => warn!("Failed to stop meeting at the duration limit: {}", e),
            }
        }
    });
}
