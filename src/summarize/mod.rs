//! Summarization engine capability and adapters.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EngineSectionConfig;
use crate::engine::{EngineCore, EngineManager};

pub mod ollama;

pub use ollama::OllamaEngine;

/// Structured enrichment produced from an authoritative transcript.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingSummary {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
}

#[async_trait]
pub trait SummarizationEngine: EngineCore {
    async fn summarize(&mut self, text: &str) -> anyhow::Result<String>;

    async fn extract_key_points(&mut self, text: &str) -> anyhow::Result<Vec<String>>;

    async fn extract_action_items(&mut self, text: &str) -> anyhow::Result<Vec<String>>;
}

/// Build the summarization manager with every known adapter registered.
pub fn build_manager(section: &EngineSectionConfig) -> EngineManager<dyn SummarizationEngine> {
    let mut manager: EngineManager<dyn SummarizationEngine> = EngineManager::new("summarization");
    manager.register(
        "ollama",
        section.engine_config("ollama"),
        Box::new(|config| Box::new(OllamaEngine::new(config))),
    );
    manager
}
