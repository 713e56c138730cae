//! Generic engine registry with transactional hot-swap.
//!
//! One `EngineManager` instance exists per engine family (speech-to-text,
//! summarization). A single async mutex guards the current engine slot, so
//! a swap can never interleave with an in-flight processing call and a
//! processing call can never observe a half-swapped manager.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

/// Settings handed to an engine factory. One shared shape covers every
/// adapter; engines read the fields they care about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: Option<String>,
    pub model_path: Option<String>,
    pub language: Option<String>,
    pub command_path: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Lifecycle surface every managed engine implements. Domain operations
/// live on the family traits (`SttEngine`, `SummarizationEngine`).
#[async_trait]
pub trait EngineCore: Send {
    fn name(&self) -> &'static str;

    /// Heavy, fallible setup. A manager only commits an engine whose
    /// `initialize` returned Ok.
    async fn initialize(&mut self) -> anyhow::Result<()>;

    /// Release engine resources. Infallible; called exactly once before the
    /// instance is replaced or the manager shuts down.
    async fn cleanup(&mut self);
}

pub type EngineFactory<E> = Box<dyn Fn(EngineConfig) -> Box<E> + Send + Sync>;

struct RegisteredEngine<E: ?Sized> {
    factory: EngineFactory<E>,
    config: EngineConfig,
}

struct CurrentEngine<E: ?Sized> {
    name: String,
    config: EngineConfig,
    engine: Box<E>,
}

/// Snapshot of a manager's current engine for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub name: Option<String>,
    pub initialized: bool,
    pub config: Option<EngineConfig>,
}

pub struct EngineManager<E: EngineCore + ?Sized> {
    label: &'static str,
    registry: HashMap<String, RegisteredEngine<E>>,
    current: Mutex<Option<CurrentEngine<E>>>,
}

impl<E: EngineCore + ?Sized> EngineManager<E> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            registry: HashMap::new(),
            current: Mutex::new(None),
        }
    }

    /// Register a named factory. Called once at configuration load, before
    /// the manager is shared.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        config: EngineConfig,
        factory: EngineFactory<E>,
    ) {
        self.registry
            .insert(name.into(), RegisteredEngine { factory, config });
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn available_engines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn current_engine_name(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(|c| c.name.clone())
    }

    pub async fn status(&self) -> EngineStatus {
        let slot = self.current.lock().await;
        match slot.as_ref() {
            Some(current) => {
                // The key never leaves the process.
                let mut config = current.config.clone();
                config.api_key = None;
                EngineStatus {
                    name: Some(current.name.clone()),
                    initialized: true,
                    config: Some(config),
                }
            }
            None => EngineStatus {
                name: None,
                initialized: false,
                config: None,
            },
        }
    }

    /// Transactional swap. Constructs and initializes the replacement while
    /// holding the slot lock; only on success is the old engine cleaned up
    /// and the new one committed. On failure the previous engine (if any)
    /// stays current and the method returns false.
    pub async fn switch_engine(&self, name: &str) -> bool {
        let registered = match self.registry.get(name) {
            Some(r) => r,
            None => {
                warn!("{}: unknown engine '{}'", self.label, name);
                return false;
            }
        };

        let mut slot = self.current.lock().await;

        let mut fresh = (registered.factory)(registered.config.clone());
        match fresh.initialize().await {
            Ok(()) => {
                if let Some(mut old) = slot.take() {
                    old.engine.cleanup().await;
                }
                info!("{}: switched to engine '{}'", self.label, name);
                *slot = Some(CurrentEngine {
                    name: name.to_string(),
                    config: registered.config.clone(),
                    engine: fresh,
                });
                true
            }
            Err(e) => {
                warn!(
                    "{}: engine '{}' failed to initialize, keeping previous engine: {:#}",
                    self.label, name, e
                );
                false
            }
        }
    }

    /// Best-effort default engine setup at construction time. A failure
    /// leaves the manager in the "no engine" state instead of erroring, so
    /// callers can inspect status and switch to something else.
    pub async fn initialize_default(&self, name: &str) {
        if name.is_empty() {
            warn!("{}: no default engine configured", self.label);
            return;
        }
        if !self.switch_engine(name).await {
            warn!(
                "{}: default engine '{}' unavailable, starting without an engine",
                self.label, name
            );
        }
    }

    /// Exclusive access to the current engine for a processing call. Fails
    /// with `EngineNotInitialized` when no engine is live; holding the
    /// returned guard blocks any concurrent swap.
    pub async fn acquire(&self) -> CoreResult<EngineGuard<'_, E>> {
        let guard = self.current.lock().await;
        if guard.is_none() {
            return Err(CoreError::EngineNotInitialized {
                manager: self.label,
            });
        }
        Ok(EngineGuard { guard })
    }

    /// Clean up the current engine, leaving the manager engineless.
    pub async fn shutdown(&self) {
        let mut slot = self.current.lock().await;
        if let Some(mut current) = slot.take() {
            current.engine.cleanup().await;
        }
    }
}

/// Lock over the current engine, handed out by [`EngineManager::acquire`].
pub struct EngineGuard<'a, E: EngineCore + ?Sized> {
    guard: MutexGuard<'a, Option<CurrentEngine<E>>>,
}

impl<'a, E: EngineCore + ?Sized> EngineGuard<'a, E> {
    pub fn name(&self) -> &str {
        match self.guard.as_ref() {
            Some(current) => &current.name,
            None => unreachable!("EngineGuard constructed without a live engine"),
        }
    }

    pub fn engine(&mut self) -> &mut E {
        match self.guard.as_mut() {
            Some(current) => current.engine.as_mut(),
            None => unreachable!("EngineGuard constructed without a live engine"),
        }
    }
}
