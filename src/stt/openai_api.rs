//! OpenAI-compatible transcription API adapter.
//!
//! Uploads the finalized recording to an `/audio/transcriptions` endpoint
//! via multipart. Works against OpenAI itself or any compatible local
//! server when `base_url` points at it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{AudioInput, SttEngine, TranscriptionResult};
use crate::engine::{EngineConfig, EngineCore};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct OpenAiApiEngine {
    config: EngineConfig,
    client: reqwest::Client,
    base_url: String,
    ready: bool,
}

impl OpenAiApiEngine {
    pub fn new(config: EngineConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            ready: false,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .context("api_key is required for the openai-api engine")
    }

    fn model(&self) -> String {
        self.config
            .model
            .clone()
            .unwrap_or_else(|| "whisper-1".to_string())
    }

    async fn upload(&self, file_name: String, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .context("Failed to build multipart body")?,
            )
            .text("model", self.model());

        if let Some(language) = &self.config.language {
            if language != "auto" {
                form = form.text("language", language.clone());
            }
        }

        debug!("Uploading audio for transcription to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            bail!("transcription API returned status {}: {}", status, body);
        }

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).context("Failed to parse transcription response")?;

        Ok(parsed.text.trim().to_string())
    }
}

#[async_trait]
impl EngineCore for OpenAiApiEngine {
    fn name(&self) -> &'static str {
        "openai-api"
    }

    async fn initialize(&mut self) -> Result<()> {
        if self.api_key()?.is_empty() {
            bail!("api_key is empty for the openai-api engine");
        }
        info!("openai-api transcription ready against {}", self.base_url);
        self.ready = true;
        Ok(())
    }

    async fn cleanup(&mut self) {
        self.ready = false;
    }
}

#[async_trait]
impl SttEngine for OpenAiApiEngine {
    async fn transcribe(&mut self, input: AudioInput<'_>) -> Result<TranscriptionResult> {
        if !self.ready {
            bail!("openai-api engine not initialized");
        }

        let text = match input {
            AudioInput::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read audio file {:?}", path))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "audio.wav".to_string());
                self.upload(file_name, bytes).await?
            }
            AudioInput::Samples {
                samples,
                sample_rate,
            } => {
                let temp = super::write_temp_wav(samples, sample_rate)?;
                let bytes = tokio::fs::read(temp.path())
                    .await
                    .context("Failed to read temp WAV")?;
                self.upload("audio.wav".to_string(), bytes).await?
            }
        };

        Ok(TranscriptionResult {
            text,
            confidence: 0.0,
            language: self.config.language.clone(),
            segments: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine_for(server: &MockServer) -> OpenAiApiEngine {
        OpenAiApiEngine::new(EngineConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some(server.uri()),
            language: Some("en".to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_initialize_requires_api_key() {
        let mut engine = OpenAiApiEngine::new(EngineConfig::default());
        assert!(engine.initialize().await.is_err());
    }

    #[tokio::test]
    async fn test_transcribe_samples_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "text": " hello from the mock "
                })),
            )
            .mount(&server)
            .await;

        let mut engine = engine_for(&server);
        engine.initialize().await.unwrap();

        let samples = vec![0.0f32; 1600];
        let result = engine
            .transcribe(AudioInput::Samples {
                samples: &samples,
                sample_rate: 16000,
            })
            .await
            .unwrap();

        assert_eq!(result.text, "hello from the mock");
    }

    #[tokio::test]
    async fn test_transcribe_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let mut engine = engine_for(&server);
        engine.initialize().await.unwrap();

        let samples = vec![0.0f32; 1600];
        let err = engine
            .transcribe(AudioInput::Samples {
                samples: &samples,
                sample_rate: 16000,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("500"));
    }
}
