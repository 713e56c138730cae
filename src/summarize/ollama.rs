//! Ollama summarization adapter.
//!
//! Talks to a local Ollama server. `initialize` verifies the configured
//! model is actually present so a swap to a missing model is rejected up
//! front instead of failing on the first meeting.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SummarizationEngine;
use crate::engine::{EngineConfig, EngineCore};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5:3b";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

pub struct OllamaEngine {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    ready: bool,
}

impl OllamaEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens.unwrap_or(1000),
            temperature: config.temperature.unwrap_or(0.7),
            ready: false,
        }
    }

    async fn generate(&self, prompt: String, max_tokens: u32) -> Result<String> {
        if !self.ready {
            bail!("ollama engine not initialized");
        }

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: max_tokens,
                temperature: self.temperature,
                top_p: 0.9,
                stop: vec!["<|endoftext|>".to_string(), "<|im_end|>".to_string()],
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        debug!("Requesting generation from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Ollama")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Ollama response body")?;

        if !status.is_success() {
            bail!("Ollama returned status {}: {}", status, body);
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse Ollama response")?;

        Ok(parsed.response.trim().to_string())
    }
}

/// Pull bullet items out of a model response. Accepts `-`, `•`, `*` and
/// `1.`-style prefixes; ignores fragments too short to be a real item.
fn parse_bullets(response: &str, limit: usize) -> Vec<String> {
    let bullet = Regex::new(r"^(?:[-•*]|\d+\.)\s*").expect("static regex");

    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            if bullet.is_match(line) {
                let item = bullet.replace(line, "").trim().to_string();
                if item.len() > 5 {
                    return Some(item);
                }
            }
            None
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl EngineCore for OllamaEngine {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn initialize(&mut self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to Ollama (is it running?)")?;

        if !response.status().is_success() {
            bail!("Ollama returned status {}", response.status());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama model list")?;

        let names: Vec<&str> = tags.models.iter().map(|m| m.name.as_str()).collect();
        if !names.contains(&self.model.as_str()) {
            bail!(
                "model '{}' not found in Ollama (available: {})",
                self.model,
                names.join(", ")
            );
        }

        info!("Connected to Ollama with model '{}'", self.model);
        self.ready = true;
        Ok(())
    }

    async fn cleanup(&mut self) {
        // API-backed engine; nothing to release.
        self.ready = false;
    }
}

#[async_trait]
impl SummarizationEngine for OllamaEngine {
    async fn summarize(&mut self, text: &str) -> Result<String> {
        let prompt = format!(
            "Please provide a concise summary of the following meeting transcript.\n\
             Focus on the main topics discussed, decisions made, and important points raised.\n\n\
             Meeting Transcript:\n{text}\n\nSummary:"
        );
        self.generate(prompt, self.max_tokens).await
    }

    async fn extract_key_points(&mut self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Please extract the key points and main topics discussed in the following meeting transcript.\n\
             List each key point as a separate bullet point.\n\
             Format: - Key point description\n\n\
             Meeting Transcript:\n{text}\n\nKey Points:"
        );
        let response = self.generate(prompt, 500).await?;
        Ok(parse_bullets(&response, 8))
    }

    async fn extract_action_items(&mut self, text: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Please extract all action items from the following meeting transcript.\n\
             List each action item as a separate bullet point. Include who is responsible if mentioned.\n\
             Format: - Action item description\n\n\
             Meeting Transcript:\n{text}\n\nAction Items:"
        );
        let response = self.generate(prompt, 500).await?;
        Ok(parse_bullets(&response, 10))
    }
}
