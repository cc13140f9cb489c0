//! Fallback Provider Chain
//!
//! Tries providers in order. Each failure is classified by `ErrorClassifier`
//! and the category decides what happens next:
//!
//! - rate limit: wait (retry-after when known) and retry the same provider
//! - network / transient / unknown: exponential backoff with jitter, retry
//! - parse error: short pause, retry
//! - auth / token limit / unavailable: move to the next provider
//! - bad request: stop, the prompt itself is at fault

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::{LlmProvider, LlmResponse, SharedProvider};
use crate::constants::chain as chain_constants;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, NuplanError, Result};

/// Provider with its retry budget
#[derive(Clone)]
pub struct ChainedProvider {
    pub provider: SharedProvider,
    /// Attempts on this provider before moving on
    pub max_retries: u8,
}

impl ChainedProvider {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            max_retries: chain_constants::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Maximum total attempts across all providers
    pub max_total_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_total_attempts: chain_constants::MAX_TOTAL_ATTEMPTS,
            base_delay: Duration::from_millis(chain_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(chain_constants::MAX_DELAY_SECS),
            backoff_factor: chain_constants::BACKOFF_FACTOR,
        }
    }
}

/// One attempt, for diagnostics
#[derive(Debug)]
pub struct ChainAttempt {
    pub provider_name: String,
    pub attempt: u8,
    pub error: Option<LlmError>,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
pub struct ChainStats {
    pub total_attempts: usize,
    pub successful_provider: Option<String>,
    pub attempts: Vec<ChainAttempt>,
}

pub struct ProviderChain {
    providers: Vec<ChainedProvider>,
    config: ChainConfig,
}

impl ProviderChain {
    #[instrument(skip(self, prompt, schema), fields(providers = self.providers.len()))]
    pub async fn execute(&self, prompt: &str, schema: &Value) -> Result<(LlmResponse, ChainStats)> {
        if self.providers.is_empty() {
            return Err(NuplanError::Config(
                "No providers configured in chain".to_string(),
            ));
        }

        let mut stats = ChainStats::default();
        let mut last_error: Option<NuplanError> = None;

        'providers: for entry in &self.providers {
            let name = entry.provider.name().to_string();
            let mut delay = self.config.base_delay;

            for attempt in 1..=entry.max_retries {
                if stats.total_attempts >= self.config.max_total_attempts {
                    break 'providers;
                }
                stats.total_attempts += 1;
                let started = Instant::now();

                debug!(provider = %name, attempt, "Chain attempt");

                let err = match entry.provider.generate(prompt, schema).await {
                    Ok(response) => {
                        stats.attempts.push(ChainAttempt {
                            provider_name: name.clone(),
                            attempt,
                            error: None,
                            duration_ms: started.elapsed().as_millis() as u64,
                        });
                        info!(provider = %name, attempts = stats.total_attempts, "Chain succeeded");
                        stats.successful_provider = Some(name);
                        return Ok((response, stats));
                    }
                    Err(err) => err,
                };

                let classified = match &err {
                    NuplanError::Llm(llm) => llm.clone(),
                    other => ErrorClassifier::classify(&other.to_string(), &name),
                };
                warn!(
                    provider = %name,
                    attempt,
                    category = %classified.category,
                    error = %err,
                    "Provider failed"
                );
                stats.attempts.push(ChainAttempt {
                    provider_name: name.clone(),
                    attempt,
                    error: Some(classified.clone()),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                last_error = Some(err);

                let has_retry_left = attempt < entry.max_retries;
                match classified.category {
                    ErrorCategory::BadRequest => break 'providers,
                    category if category.should_fallback() => {
                        info!(provider = %name, %category, "Trying next provider");
                        break;
                    }
                    ErrorCategory::RateLimit if has_retry_left => {
                        let wait = classified
                            .retry_after
                            .or_else(|| parse_rate_limit_delay(&classified.message))
                            .unwrap_or_else(|| classified.recommended_delay());
                        info!(wait_secs = wait.as_secs(), "Rate limited, waiting before retry");
                        sleep(wait).await;
                    }
                    ErrorCategory::ParseError if has_retry_left => {
                        sleep(self.config.base_delay).await;
                    }
                    _ if has_retry_left => {
                        let wait = delay + random_jitter(delay);
                        debug!(delay_ms = wait.as_millis() as u64, "Retrying after backoff");
                        sleep(wait).await;
                        delay = calculate_backoff(
                            delay,
                            self.config.backoff_factor,
                            self.config.max_delay,
                        );
                    }
                    _ => {}
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| NuplanError::LlmApi("All providers in chain failed".to_string())))
    }
}

#[async_trait]
impl LlmProvider for ProviderChain {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let (response, _stats) = self.execute(prompt, schema).await?;
        Ok(response)
    }

    fn name(&self) -> &str {
        "provider-chain"
    }

    fn model(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.provider.model())
            .unwrap_or("unknown")
    }

    async fn health_check(&self) -> Result<bool> {
        for entry in &self.providers {
            if entry.provider.health_check().await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Extract a retry-after delay in seconds from an error message, capped at 5 minutes
fn parse_rate_limit_delay(message: &str) -> Option<Duration> {
    let lower = message.to_lowercase();
    ["retry", "wait ", "in "].iter().find_map(|marker| {
        let idx = lower.find(marker)?;
        lower[idx..]
            .split(|c: char| !c.is_ascii_digit())
            .find(|token| !token.is_empty())
            .and_then(|token| token.parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.min(300)))
    })
}

fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_jitter_ms))
}

fn calculate_backoff(current: Duration, factor: f32, max: Duration) -> Duration {
    std::cmp::min(Duration::from_secs_f32(current.as_secs_f32() * factor), max)
}

pub struct ProviderChainBuilder {
    providers: Vec<ChainedProvider>,
    config: ChainConfig,
}

impl ProviderChainBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            config: ChainConfig::default(),
        }
    }

    pub fn add_provider(self, provider: impl LlmProvider + 'static, max_retries: u8) -> Self {
        self.add_shared(Arc::new(provider), max_retries)
    }

    pub fn add_shared(mut self, provider: SharedProvider, max_retries: u8) -> Self {
        self.providers
            .push(ChainedProvider::new(provider).with_max_retries(max_retries));
        self
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ProviderChain {
        ProviderChain {
            providers: self.providers,
            config: self.config,
        }
    }
}

impl Default for ProviderChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::ScriptedProvider;
    use serde_json::json;

    fn fast() -> ChainConfig {
        ChainConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let chain = ProviderChainBuilder::new()
            .add_provider(ScriptedProvider::always(json!({"who": "primary"})), 2)
            .add_provider(ScriptedProvider::always(json!({"who": "fallback"})), 2)
            .with_config(fast())
            .build();

        let (response, stats) = chain.execute("p", &Value::Null).await.unwrap();
        assert_eq!(response.content["who"], "primary");
        assert_eq!(stats.total_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let flaky = ScriptedProvider::new(vec![
            Err(NuplanError::LlmApi("overloaded".to_string())),
            Ok(json!({"ok": true})),
        ]);
        let chain = ProviderChainBuilder::new()
            .add_provider(flaky, 3)
            .with_config(fast())
            .build();

        let (response, stats) = chain.execute("p", &Value::Null).await.unwrap();
        assert_eq!(response.content["ok"], true);
        assert_eq!(stats.total_attempts, 2);
    }

    #[tokio::test]
    async fn test_unavailable_falls_through_without_retry() {
        let missing = Arc::new(ScriptedProvider::failing("claude: command not found"));
        let chain = ProviderChainBuilder::new()
            .add_shared(missing.clone(), 3)
            .add_provider(ScriptedProvider::always(json!({"who": "fallback"})), 1)
            .with_config(fast())
            .build();

        let (response, _) = chain.execute("p", &Value::Null).await.unwrap();
        assert_eq!(response.content["who"], "fallback");
        assert_eq!(missing.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_stops_chain() {
        let fallback = Arc::new(ScriptedProvider::always(json!({})));
        let chain = ProviderChainBuilder::new()
            .add_provider(ScriptedProvider::failing("400 bad request"), 3)
            .add_shared(fallback.clone(), 1)
            .with_config(fast())
            .build();

        assert!(chain.execute("p", &Value::Null).await.is_err());
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_total_attempt_cap() {
        let always_down = Arc::new(ScriptedProvider::failing("overloaded"));
        let chain = ProviderChainBuilder::new()
            .add_shared(always_down.clone(), 10)
            .with_config(ChainConfig {
                max_total_attempts: 3,
                ..fast()
            })
            .build();

        assert!(chain.execute("p", &Value::Null).await.is_err());
        assert_eq!(always_down.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_chain_is_config_error() {
        let chain = ProviderChainBuilder::new().build();
        assert!(matches!(
            chain.execute("p", &Value::Null).await,
            Err(NuplanError::Config(_))
        ));
    }

    #[test]
    fn test_random_jitter_bounded() {
        let jitter = random_jitter(Duration::from_millis(1000));
        assert!(jitter <= Duration::from_millis(250));
    }

    #[test]
    fn test_calculate_backoff() {
        let next = calculate_backoff(Duration::from_millis(500), 1.5, Duration::from_secs(30));
        assert_eq!(next, Duration::from_millis(750));
        let capped = calculate_backoff(Duration::from_secs(25), 1.5, Duration::from_secs(30));
        assert_eq!(capped, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_rate_limit_delay() {
        assert_eq!(
            parse_rate_limit_delay("Rate limit exceeded. Please retry after 30 seconds."),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_rate_limit_delay("Too many requests. Please wait 60 seconds."),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_rate_limit_delay("Retry after 1000 seconds"),
            Some(Duration::from_secs(300))
        );
        assert_eq!(parse_rate_limit_delay("Rate limit exceeded"), None);
    }
}
