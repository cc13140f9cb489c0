//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait the oracle talks to. A provider returns
//! either structured JSON or the raw reply text as `Value::String`; turning
//! text into JSON is the oracle's job.
//!
//! ## Modules
//!
//! - `claude_code`: local Claude Code CLI
//! - `openai`: OpenAI-compatible chat completions over HTTP
//! - `chain`: ordered fallback chain with category-driven retry

mod chain;
mod claude_code;
mod openai;
mod prompt_utils;

pub use chain::{ChainConfig, ChainedProvider, ProviderChain, ProviderChainBuilder};
pub use claude_code::ClaudeCodeProvider;
pub use openai::OpenAiProvider;
pub use prompt_utils::build_schema_prompt;

pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::LlmConfig;
use crate::types::{NuplanError, Result};

// =============================================================================
// LLM Response
// =============================================================================

#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Structured JSON, or the raw reply as `Value::String`
    pub content: Value,
    pub usage: TokenUsage,
    /// Cost in USD when the provider reports it
    pub cost_usd: f64,
    pub elapsed_ms: u64,
    pub provider: String,
    pub model: String,
}

impl LlmResponse {
    /// Response with content only (usage/cost unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            cost_usd: 0.0,
            elapsed_ms: 0,
            provider: String::new(),
            model: String::new(),
        }
    }

    /// Raw reply text, for callers that must parse it themselves
    pub fn text(text: impl Into<String>) -> Self {
        Self::content_only(Value::String(text.into()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared LLM provider type
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for one provider
///
/// API keys are never serialized and are redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "claude-code", "openai"
    pub provider: String,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_max_tokens() -> usize {
    4096
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "claude-code".to_string(),
            model: None,
            timeout_secs: crate::constants::oracle::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            api_key: None,
            api_base: None,
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    /// Primary provider settings from the `[llm]` section
    pub fn primary(llm: &LlmConfig) -> Self {
        Self {
            provider: llm.provider.clone(),
            model: Some(llm.model.clone()),
            timeout_secs: llm.timeout_secs,
            temperature: llm.temperature,
            api_base: llm.api_base.clone(),
            ..Default::default()
        }
    }

    /// Fallback provider settings, when one is configured
    pub fn fallback(llm: &LlmConfig) -> Option<Self> {
        let provider = llm.fallback_provider.clone()?;
        Some(Self {
            provider,
            model: llm.fallback_model.clone(),
            timeout_secs: llm.timeout_secs,
            temperature: llm.temperature,
            api_base: llm.api_base.clone(),
            ..Default::default()
        })
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a reply, steering towards `schema` when it is not null
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedProvider> {
    match config.provider.as_str() {
        "claude-code" => Ok(Arc::new(ClaudeCodeProvider::new(config.clone()))),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        _ => Err(NuplanError::Config(format!(
            "Unknown provider: {}. Supported: claude-code, openai",
            config.provider
        ))),
    }
}

/// Build the oracle's provider from `[llm]`: `None` when disabled, a chain
/// when a fallback provider is configured.
pub fn provider_from_config(llm: &LlmConfig) -> Result<Option<SharedProvider>> {
    if !llm.enabled {
        info!("Oracle disabled by configuration");
        return Ok(None);
    }

    let primary = create_provider(&ProviderConfig::primary(llm))?;
    let Some(fallback_config) = ProviderConfig::fallback(llm) else {
        return Ok(Some(primary));
    };

    let fallback = create_provider(&fallback_config)?;
    let chain = ProviderChainBuilder::new()
        .add_shared(primary, llm.max_retries)
        .add_shared(fallback, llm.max_retries)
        .build();
    Ok(Some(Arc::new(chain)))
}

// =============================================================================
// Test doubles
// =============================================================================

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replies from a fixed script, then repeats the last entry
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<Value>>>,
        last: Mutex<Option<Value>>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<Result<Value>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Always answers with `value`
        pub fn always(value: Value) -> Self {
            Self::new(vec![Ok(value)])
        }

        /// Always answers with raw text
        pub fn text(text: &str) -> Self {
            Self::always(Value::String(text.to_string()))
        }

        /// Always fails with an API error
        pub fn failing(message: &str) -> Self {
            Self::new(vec![Err(NuplanError::LlmApi(message.to_string()))])
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn shared(self) -> SharedProvider {
            Arc::new(self)
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, prompt: &str, _schema: &Value) -> Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(value)) => {
                    *self.last.lock().unwrap() = Some(value.clone());
                    Ok(LlmResponse::content_only(value))
                }
                Some(Err(err)) => {
                    // Failures repeat once the script is exhausted
                    let message = err.to_string();
                    self.replies
                        .lock()
                        .unwrap()
                        .push_back(Err(NuplanError::LlmApi(message)));
                    Err(err)
                }
                None => match self.last.lock().unwrap().clone() {
                    Some(value) => Ok(LlmResponse::content_only(value)),
                    None => Err(NuplanError::LlmApi("script exhausted".to_string())),
                },
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }
}
