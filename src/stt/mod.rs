//! Speech-to-text engine capability and adapters.
//!
//! Engines are only ever touched through this trait; no caller inspects a
//! concrete adapter type. `transcribe_stream` is an optional capability —
//! the default implementation reports "no partial available".

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::EngineSectionConfig;
use crate::engine::{EngineCore, EngineManager};

pub mod openai_api;
pub mod whisper_cli;

pub use openai_api::OpenAiApiEngine;
pub use whisper_cli::WhisperCliEngine;

/// Audio handed to a transcription call.
pub enum AudioInput<'a> {
    File(&'a Path),
    Samples {
        samples: &'a [f32],
        sample_rate: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegment {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub confidence: f32,
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
}

#[async_trait]
pub trait SttEngine: EngineCore {
    /// Full transcription of a finalized recording.
    async fn transcribe(&mut self, input: AudioInput<'_>) -> anyhow::Result<TranscriptionResult>;

    /// Best-effort partial transcription of accumulated live audio.
    /// `Ok(None)` means no partial is available for this window.
    async fn transcribe_stream(
        &mut self,
        _samples: &[f32],
        _sample_rate: u32,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Spill samples into a temp WAV so file-based adapters can handle raw
/// sample input. Mono, matching the capture pipeline.
pub(crate) fn write_temp_wav(samples: &[f32], sample_rate: u32) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("meetscribe-stt-")
        .suffix(".wav")
        .tempfile()
        .context("Failed to create temp WAV")?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(file.path(), spec).context("Failed to open temp WAV")?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize temp WAV")?;

    Ok(file)
}

/// Build the STT manager with every known adapter registered. The default
/// engine is initialized separately (and non-fatally) by the caller.
pub fn build_manager(section: &EngineSectionConfig) -> EngineManager<dyn SttEngine> {
    let mut manager: EngineManager<dyn SttEngine> = EngineManager::new("stt");
    manager.register(
        "whisper-cli",
        section.engine_config("whisper-cli"),
        Box::new(|config| Box::new(WhisperCliEngine::new(config))),
    );
    manager.register(
        "openai-api",
        section.engine_config("openai-api"),
        Box::new(|config| Box::new(OpenAiApiEngine::new(config))),
    );
    manager
}
