//! whisper.cpp subprocess adapter.
//!
//! Shells out to a local `whisper-cli` binary for full-file transcription.
//! Streaming partials reuse the same binary against a temp WAV of the
//! accumulated window, skipping windows shorter than one second.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{write_temp_wav, AudioInput, SttEngine, TranscriptionResult};
use crate::engine::{EngineConfig, EngineCore};

pub struct WhisperCliEngine {
    config: EngineConfig,
    command: Option<PathBuf>,
}

impl WhisperCliEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            command: None,
        }
    }

    fn command(&self) -> Result<&Path> {
        self.command
            .as_deref()
            .context("whisper-cli engine not initialized")
    }

    fn language(&self) -> &str {
        self.config.language.as_deref().unwrap_or("en")
    }

    async fn run_whisper(&self, audio_path: &Path) -> Result<String> {
        let command = self.command()?;
        let model_path = self
            .config
            .model_path
            .as_deref()
            .context("model_path is required for the whisper-cli engine")?;

        debug!("Running {:?} on {:?}", command, audio_path);

        let output = tokio::process::Command::new(command)
            .arg("-m")
            .arg(model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-l")
            .arg(self.language())
            .arg("-nt")
            .arg("-np")
            .output()
            .await
            .context("Failed to run whisper-cli")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "whisper-cli exited with status {}: {}",
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

}

#[async_trait]
impl EngineCore for WhisperCliEngine {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    async fn initialize(&mut self) -> Result<()> {
        let command = match self.config.command_path.as_deref() {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    bail!("configured whisper-cli command not found: {:?}", path);
                }
                path
            }
            None => which::which("whisper-cli")
                .or_else(|_| which::which("whisper-cpp"))
                .context("whisper-cli binary not found in PATH")?,
        };

        let model_path = self
            .config
            .model_path
            .as_deref()
            .context("model_path is required for the whisper-cli engine")?;
        if !Path::new(model_path).exists() {
            bail!("whisper model not found: {}", model_path);
        }

        info!("whisper-cli ready: {:?} (model {})", command, model_path);
        self.command = Some(command);
        Ok(())
    }

    async fn cleanup(&mut self) {
        self.command = None;
    }
}

#[async_trait]
impl SttEngine for WhisperCliEngine {
    async fn transcribe(&mut self, input: AudioInput<'_>) -> Result<TranscriptionResult> {
        let text = match input {
            AudioInput::File(path) => {
                if !path.exists() {
                    bail!("audio file not found: {:?}", path);
                }
                self.run_whisper(path).await?
            }
            AudioInput::Samples {
                samples,
                sample_rate,
            } => {
                let temp = write_temp_wav(samples, sample_rate)?;
                self.run_whisper(temp.path()).await?
            }
        };

        Ok(TranscriptionResult {
            text,
            confidence: 0.0,
            language: self.config.language.clone(),
            segments: Vec::new(),
        })
    }

    async fn transcribe_stream(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Option<String>> {
        // Windows under one second carry too little speech to be useful.
        if samples.len() < sample_rate as usize {
            return Ok(None);
        }

        let temp = write_temp_wav(samples, sample_rate)?;
        let text = self.run_whisper(temp.path()).await?;
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_fails_without_model_path() {
        let mut engine = WhisperCliEngine::new(EngineConfig {
            command_path: Some("/bin/sh".to_string()),
            ..Default::default()
        });
        let err = engine.initialize().await.unwrap_err();
        assert!(err.to_string().contains("model_path"));
    }

    #[tokio::test]
    async fn test_initialize_fails_with_missing_command() {
        let mut engine = WhisperCliEngine::new(EngineConfig {
            command_path: Some("/nonexistent/whisper-cli".to_string()),
            model_path: Some("/nonexistent/model.bin".to_string()),
            ..Default::default()
        });
        assert!(engine.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_stream_skips_short_windows() {
        let mut engine = WhisperCliEngine::new(EngineConfig::default());
        let samples = vec![0.0f32; 4000];
        let partial = engine.transcribe_stream(&samples, 16000).await.unwrap();
        assert!(partial.is_none());
    }

    #[tokio::test]
    async fn test_transcribe_missing_file_fails() {
        let mut engine = WhisperCliEngine::new(EngineConfig::default());
        engine.command = Some(PathBuf::from("/bin/true"));
        let result = engine
            .transcribe(AudioInput::File(Path::new("/nonexistent/audio.wav")))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_temp_wav_roundtrip() {
        let samples = vec![0.25f32, -0.25, 0.5, -0.5];
        let temp = write_temp_wav(&samples, 16000).unwrap();

        let reader = hound::WavReader::open(temp.path()).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 4);
    }
}
