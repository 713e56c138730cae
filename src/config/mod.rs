use crate::engine::EngineConfig;
use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: EngineSectionConfig,
    pub summarization: EngineSectionConfig,
    pub processing: ProcessingConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per emitted chunk.
    pub chunk_size: usize,
    /// Input device index; None means the default device.
    pub input_device: Option<usize>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 1024,
            input_device: None,
        }
    }
}

/// Configuration for one engine family (STT or summarization).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSectionConfig {
    pub default_engine: String,
    /// Timeout applied to every engine call backed by an external service.
    pub request_timeout_seconds: u64,
    /// Per-engine settings, keyed by registry name.
    pub engines: HashMap<String, EngineConfig>,
}

impl Default for EngineSectionConfig {
    fn default() -> Self {
        Self {
            default_engine: String::new(),
            request_timeout_seconds: 300,
            engines: HashMap::new(),
        }
    }
}

impl EngineSectionConfig {
    pub fn engine_config(&self, name: &str) -> EngineConfig {
        self.engines.get(name).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Feed captured chunks to the STT engine's streaming operation while
    /// recording. The live transcript is advisory only.
    pub real_time_stt: bool,
    /// Summarize the authoritative transcript when stopping a meeting.
    pub auto_summarize: bool,
    /// Interval between streaming transcription attempts.
    pub chunk_duration_seconds: u64,
    /// Recording length at which the session is flagged for stopping.
    /// 0 disables the limit.
    pub max_meeting_duration_seconds: u64,
    /// Consecutive empty/failed streaming rounds before live transcription
    /// is disabled for the rest of the session. 0 keeps it running forever.
    pub stream_failure_threshold: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            real_time_stt: false,
            auto_summarize: true,
            chunk_duration_seconds: 5,
            max_meeting_duration_seconds: 4 * 3600,
            stream_failure_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // MEET on a phone keypad
        Self { port: 6338 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::with_defaults();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Defaults with the engine registries pre-selected, matching what
    /// `stt::build_manager` and `summarize::build_manager` register.
    pub fn with_defaults() -> Self {
        let mut config = Self::default();
        config.stt.default_engine = "whisper-cli".to_string();
        config.stt.request_timeout_seconds = 600;
        config.summarization.default_engine = "ollama".to_string();
        config.summarization.request_timeout_seconds = 120;
        config
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
