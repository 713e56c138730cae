//! Meeting session orchestrator.
//!
//! Owns the single session state machine (Idle → Recording → Finalizing →
//! Idle) and composes the capture controller, the two engine managers and
//! the persistence layer. Presentation layers call into this type only.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::status::{MeetingStatus, SessionPhase, SessionStatusHandle};
use crate::audio::{AudioCaptureController, AudioChunk, AudioSpec, CaptureBackend, InputDevice};
use crate::config::Config;
use crate::engine::{EngineManager, EngineStatus};
use crate::error::{CoreError, CoreResult};
use crate::persist::{MeetingRecord, PersistenceLayer};
use crate::stt::{self, AudioInput, SttEngine, TranscriptionResult};
use crate::summarize::{self, MeetingSummary, SummarizationEngine};

/// Live-session bookkeeping held only while Recording.
struct ActiveSession {
    id: String,
    title: String,
    participants: Vec<String>,
    started_at: DateTime<Utc>,
    feeder: Option<JoinHandle<()>>,
    deadline: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub meeting_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub meeting_id: String,
    pub audio_file: PathBuf,
    pub meeting_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MeetingSummary>,
    /// Non-fatal problems hit while finalizing (capture tail loss,
    /// enrichment failure). The stop itself still succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnginesStatus {
    pub stt: EngineStatus,
    pub summarization: EngineStatus,
}

pub struct MeetingSessionOrchestrator {
    input_device: Option<usize>,
    real_time_stt: bool,
    auto_summarize: bool,
    stream_interval: Duration,
    stream_failure_threshold: u32,
    max_meeting_duration: Duration,
    stt_timeout: Duration,
    summarization_timeout: Duration,

    capture: AudioCaptureController,
    stt: Arc<EngineManager<dyn SttEngine>>,
    summarization: Arc<EngineManager<dyn SummarizationEngine>>,
    persist: Arc<PersistenceLayer>,
    status: SessionStatusHandle,
    session: Option<ActiveSession>,
}

impl MeetingSessionOrchestrator {
    /// Build with the production engine registries and attempt to bring the
    /// configured default engines up. A failed default leaves that manager
    /// engineless rather than failing construction.
    pub async fn new(
        config: &Config,
        backend: Arc<dyn CaptureBackend>,
        persist: Arc<PersistenceLayer>,
    ) -> Self {
        let stt = Arc::new(stt::build_manager(&config.stt));
        stt.initialize_default(&config.stt.default_engine).await;

        let summarization = Arc::new(summarize::build_manager(&config.summarization));
        summarization
            .initialize_default(&config.summarization.default_engine)
            .await;

        Self::with_managers(config, backend, stt, summarization, persist)
    }

    /// Wire the orchestrator from pre-built managers. Used by `new` and by
    /// tests that register instrumented engines.
    pub fn with_managers(
        config: &Config,
        backend: Arc<dyn CaptureBackend>,
        stt: Arc<EngineManager<dyn SttEngine>>,
        summarization: Arc<EngineManager<dyn SummarizationEngine>>,
        persist: Arc<PersistenceLayer>,
    ) -> Self {
        let spec = AudioSpec {
            sample_rate: config.audio.sample_rate,
            channels: config.audio.channels,
            chunk_size: config.audio.chunk_size,
        };

        Self {
            input_device: config.audio.input_device,
            real_time_stt: config.processing.real_time_stt,
            auto_summarize: config.processing.auto_summarize,
            stream_interval: Duration::from_secs(
                config.processing.chunk_duration_seconds.max(1),
            ),
            stream_failure_threshold: config.processing.stream_failure_threshold,
            max_meeting_duration: Duration::from_secs(
                config.processing.max_meeting_duration_seconds,
            ),
            stt_timeout: Duration::from_secs(config.stt.request_timeout_seconds.max(1)),
            summarization_timeout: Duration::from_secs(
                config.summarization.request_timeout_seconds.max(1),
            ),
            capture: AudioCaptureController::new(backend, spec),
            stt,
            summarization,
            persist,
            status: SessionStatusHandle::default(),
            session: None,
        }
    }

    /// Shared handle for presentation layers; snapshots are always
    /// consistent and never block on the orchestrator itself.
    pub fn status_handle(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Idle → Recording. Fails with `SessionAlreadyActive` (and no side
    /// effects on the running session) when not Idle.
    pub async fn start_meeting(
        &mut self,
        title: Option<String>,
        participants: Vec<String>,
    ) -> CoreResult<StartOutcome> {
        if self.session.is_some() {
            return Err(CoreError::SessionAlreadyActive);
        }

        if !self.capture.is_initialized() {
            self.capture.initialize(self.input_device)?;
        }

        let id = self.persist.allocate_meeting_id();
        let title = title.unwrap_or_else(|| {
            format!("Meeting {}", chrono::Local::now().format("%Y-%m-%d %H:%M"))
        });
        let started_at = Utc::now();

        let feeder_tx = if self.real_time_stt {
            let (tx, rx) = mpsc::unbounded_channel::<AudioChunk>();
            let feeder = tokio::spawn(run_stream_feeder(
                self.stt.clone(),
                rx,
                self.status.clone(),
                self.stream_interval,
                self.stream_failure_threshold,
                self.capture.spec().sample_rate,
            ));
            Some((tx, feeder))
        } else {
            None
        };

        let chunk_tx = feeder_tx.as_ref().map(|(tx, _)| tx.clone());
        self.capture.start(Box::new(move |chunk| {
            if let Some(tx) = &chunk_tx {
                let _ = tx.send(chunk);
            }
        }))?;

        self.status
            .begin_recording(id.clone(), title.clone(), participants.clone(), started_at)
            .await;

        let deadline = if self.max_meeting_duration > Duration::ZERO {
            let status = self.status.clone();
            let limit = self.max_meeting_duration;
            Some(tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!("Meeting reached the configured duration limit");
                status.mark_limit_reached().await;
            }))
        } else {
            None
        };

        info!("Meeting '{}' started (id: {})", title, id);

        self.session = Some(ActiveSession {
            id: id.clone(),
            title: title.clone(),
            participants,
            started_at,
            feeder: feeder_tx.map(|(_, handle)| handle),
            deadline,
        });

        Ok(StartOutcome {
            meeting_id: id,
            title,
        })
    }

    /// Safe to call arbitrarily often, concurrently with capture.
    pub async fn get_status(&self) -> MeetingStatus {
        self.status.snapshot().await
    }

    /// Recording → Finalizing → Idle. Runs the full finalize pipeline
    /// synchronously; the session is gone when this returns, success or not.
    pub async fn stop_meeting(&mut self) -> CoreResult<StopOutcome> {
        let session = self.session.take().ok_or(CoreError::NoActiveSession)?;
        self.status.set_phase(SessionPhase::Finalizing).await;

        let result = self.finalize(session).await;
        match &result {
            Ok(outcome) => {
                info!(
                    "Meeting {} finalized ({}s)",
                    outcome.meeting_id, outcome.duration_seconds
                );
                self.status.reset_to_idle(None).await;
            }
            Err(e) => {
                warn!("Meeting finalize failed: {}", e);
                self.status.reset_to_idle(Some(e.to_string())).await;
            }
        }
        result
    }

    async fn finalize(&mut self, session: ActiveSession) -> CoreResult<StopOutcome> {
        if let Some(deadline) = session.deadline {
            deadline.abort();
        }
        if let Some(feeder) = session.feeder {
            feeder.abort();
            let _ = feeder.await;
        }

        let outcome = self.capture.stop()?;
        let mut warnings: Vec<String> = Vec::new();
        if let Some(read_error) = outcome.read_error {
            warnings.push(format!("capture ended early: {read_error}"));
        }

        let audio_file = self
            .persist
            .write_audio_file(
                &session.id,
                &outcome.samples,
                outcome.sample_rate,
                outcome.channels,
            )
            .map_err(CoreError::PersistenceWrite)?;

        // Authoritative transcript. Any live partial text gathered during
        // Recording is discarded here, never blended in.
        let transcription = self.run_transcription(&audio_file).await?;
        let transcript = transcription.text;

        let summary = if self.auto_summarize {
            match self.run_summarization(&transcript).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    let warning = match &e {
                        CoreError::EnrichmentFailed(_) => e.to_string(),
                        other => CoreError::EnrichmentFailed(other.to_string()).to_string(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                    None
                }
            }
        } else {
            None
        };

        let duration_seconds = (Utc::now() - session.started_at).num_seconds().max(0) as u64;

        let record = MeetingRecord {
            id: session.id.clone(),
            title: session.title,
            participants: session.participants,
            transcript,
            summary: summary.as_ref().map(|s| s.summary.clone()),
            key_points: summary.as_ref().map(|s| s.key_points.clone()),
            action_items: summary.as_ref().map(|s| s.action_items.clone()),
            audio_file: audio_file.clone(),
            duration_seconds,
            started_at: session.started_at,
            created_at: Utc::now(),
        };

        let meeting_file = self
            .persist
            .write_meeting_record(&record)
            .map_err(CoreError::PersistenceWrite)?;

        Ok(StopOutcome {
            meeting_id: session.id,
            audio_file,
            meeting_file,
            summary,
            warning: if warnings.is_empty() {
                None
            } else {
                Some(warnings.join("; "))
            },
            duration_seconds,
        })
    }

    // ------------------------------------------------------------------
    // Engine operations
    // ------------------------------------------------------------------

    async fn run_transcription(&self, audio_file: &Path) -> CoreResult<TranscriptionResult> {
        let mut guard = self.stt.acquire().await?;
        debug!("Transcribing {:?} with '{}'", audio_file, guard.name());

        match timeout(
            self.stt_timeout,
            guard.engine().transcribe(AudioInput::File(audio_file)),
        )
        .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(CoreError::TranscriptionFailed(e)),
            Err(_) => Err(CoreError::TranscriptionFailed(anyhow::anyhow!(
                "timed out after {:?}",
                self.stt_timeout
            ))),
        }
    }

    async fn run_summarization(&self, transcript: &str) -> CoreResult<MeetingSummary> {
        let mut guard = self.summarization.acquire().await?;
        debug!("Summarizing with '{}'", guard.name());

        let engine = guard.engine();
        let work = async {
            let summary = engine.summarize(transcript).await?;
            let key_points = engine.extract_key_points(transcript).await?;
            let action_items = engine.extract_action_items(transcript).await?;
            Ok::<MeetingSummary, anyhow::Error>(MeetingSummary {
                summary,
                key_points,
                action_items,
            })
        };

        match timeout(self.summarization_timeout, work).await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(CoreError::EnrichmentFailed(format!("{e:#}"))),
            Err(_) => Err(CoreError::EnrichmentFailed(format!(
                "timed out after {:?}",
                self.summarization_timeout
            ))),
        }
    }

    /// Transcribe an arbitrary audio file with the current STT engine.
    pub async fn transcribe_file(&self, path: &Path) -> CoreResult<TranscriptionResult> {
        self.run_transcription(path).await
    }

    /// Summarize arbitrary text with the current summarization engine.
    pub async fn summarize_text(&self, text: &str) -> CoreResult<MeetingSummary> {
        self.run_summarization(text).await
    }

    // ------------------------------------------------------------------
    // Engine and device management
    // ------------------------------------------------------------------

    pub fn list_input_devices(&self) -> CoreResult<Vec<InputDevice>> {
        self.capture.list_input_devices()
    }

    pub fn list_stt_engines(&self) -> Vec<String> {
        self.stt.available_engines()
    }

    pub fn list_summarization_engines(&self) -> Vec<String> {
        self.summarization.available_engines()
    }

    pub async fn switch_stt_engine(&self, name: &str) -> bool {
        self.stt.switch_engine(name).await
    }

    pub async fn switch_summarization_engine(&self, name: &str) -> bool {
        self.summarization.switch_engine(name).await
    }

    pub async fn engine_status(&self) -> EnginesStatus {
        EnginesStatus {
            stt: self.stt.status().await,
            summarization: self.summarization.status().await,
        }
    }

    /// Release both engines. Called on service shutdown.
    pub async fn shutdown(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop_meeting().await {
                warn!("Failed to finalize meeting during shutdown: {}", e);
            }
        }
        self.stt.shutdown().await;
        self.summarization.shutdown().await;
    }
}

/// Periodic task feeding accumulated live audio to the STT engine's
/// streaming operation. Output is advisory only; after
/// `failure_threshold` consecutive fruitless rounds the task disables
/// itself for the rest of the session (0 keeps it running).
async fn run_stream_feeder(
    stt: Arc<EngineManager<dyn SttEngine>>,
    mut rx: UnboundedReceiver<AudioChunk>,
    status: SessionStatusHandle,
    interval: Duration,
    failure_threshold: u32,
    sample_rate: u32,
) {
    // Cap the window so a deaf engine cannot grow it without bound.
    let max_window = sample_rate as usize * 30;
    let mut window: Vec<f32> = Vec::new();
    let mut failures: u32 = 0;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(chunk) => window.extend_from_slice(&chunk.samples),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if window.len() > max_window {
            let excess = window.len() - max_window;
            window.drain(..excess);
        }

        if !window.is_empty() {
            let result = match stt.acquire().await {
                Ok(mut guard) => guard.engine().transcribe_stream(&window, sample_rate).await,
                Err(e) => Err(anyhow::Error::new(e)),
            };

            match result {
                Ok(Some(partial)) => {
                    status.append_partial(&partial).await;
                    window.clear();
                    failures = 0;
                }
                Ok(None) => {
                    // Only count silence against the engine once it had a
                    // full second of audio to work with.
                    if window.len() >= sample_rate as usize {
                        failures += 1;
                    }
                }
                Err(e) => {
                    debug!("Streaming transcription failed: {:#}", e);
                    failures += 1;
                }
            }

            if failure_threshold > 0 && failures >= failure_threshold {
                warn!(
                    "Live transcription disabled after {} fruitless rounds",
                    failures
                );
                return;
            }
        }

        if disconnected {
            debug!("Chunk feed closed, stream feeder exiting");
            return;
        }
    }
}
