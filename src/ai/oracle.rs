//! Oracle adapter
//!
//! Every AI-assisted decision goes through [`Oracle`]. The provider may be
//! missing, slow, or chatty; callers only ever see one of three outcomes and
//! pick their deterministic fallback on anything but a parsed reply.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{SharedProvider, provider_from_config};
use super::timeout::{default_oracle_timeout, with_timeout};
use super::validation::{JsonRepairer, RepairOutcome};
use crate::config::LlmConfig;
use crate::constants::oracle::PREVIEW_CHARS;
use crate::types::{NuplanError, Result, preview};

/// Untyped oracle outcome
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    Parsed(Value),
    /// The oracle answered but no JSON could be recovered
    Malformed(String),
    /// Disabled, failed, or timed out
    Unavailable(String),
}

/// Typed oracle outcome
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply<T> {
    Ok(T),
    Malformed(String),
    Unavailable(String),
}

impl<T> OracleReply<T> {
    /// Convert to a `Result`, keeping the failure kind
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Malformed(reason) => Err(NuplanError::OracleMalformed(reason)),
            Self::Unavailable(reason) => Err(NuplanError::OracleUnavailable(reason)),
        }
    }
}

#[derive(Clone)]
pub struct Oracle {
    provider: Option<SharedProvider>,
    timeout: Duration,
}

impl Oracle {
    pub fn new(provider: Option<SharedProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Oracle with a provider and the default timeout
    pub fn with_provider(provider: SharedProvider) -> Self {
        Self::new(Some(provider), default_oracle_timeout())
    }

    /// An oracle that always answers "unavailable"
    pub fn disabled() -> Self {
        Self::new(None, default_oracle_timeout())
    }

    pub fn from_config(llm: &LlmConfig) -> Result<Self> {
        Ok(Self::new(
            provider_from_config(llm)?,
            Duration::from_secs(llm.timeout_secs),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn ask(&self, prompt: &str, schema: &Value) -> OracleOutcome {
        let Some(provider) = &self.provider else {
            return OracleOutcome::Unavailable("oracle disabled".to_string());
        };

        let response = match with_timeout(
            self.timeout,
            provider.generate(prompt, schema),
            "oracle request",
        )
        .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(provider = provider.name(), "Oracle unavailable: {}", err);
                return OracleOutcome::Unavailable(err.to_string());
            }
        };

        debug!(
            provider = provider.name(),
            tokens = response.usage.total(),
            cost_usd = response.cost_usd,
            elapsed_ms = response.elapsed_ms,
            "Oracle replied"
        );

        Self::interpret(response.content)
    }

    /// Ask and deserialize the parsed value into `T`
    pub async fn ask_for<T: DeserializeOwned>(&self, prompt: &str, schema: &Value) -> OracleReply<T> {
        match self.ask(prompt, schema).await {
            OracleOutcome::Parsed(value) => match serde_json::from_value::<T>(value.clone()) {
                Ok(typed) => OracleReply::Ok(typed),
                Err(err) => {
                    let reason = format!(
                        "unexpected shape ({}): {}",
                        err,
                        preview(&value.to_string(), PREVIEW_CHARS)
                    );
                    warn!("Malformed oracle response: {}", reason);
                    OracleReply::Malformed(reason)
                }
            },
            OracleOutcome::Malformed(reason) => OracleReply::Malformed(reason),
            OracleOutcome::Unavailable(reason) => OracleReply::Unavailable(reason),
        }
    }

    /// Turn provider content into an outcome
    fn interpret(content: Value) -> OracleOutcome {
        match content {
            Value::String(text) => match JsonRepairer::new().parse_or_repair(&text) {
                Ok((value, outcome)) => {
                    if outcome != RepairOutcome::Clean {
                        debug!("Oracle reply needed {:?} handling", outcome);
                    }
                    OracleOutcome::Parsed(value)
                }
                Err(err) => {
                    warn!("Malformed oracle response: {}", err);
                    OracleOutcome::Malformed(err.to_string())
                }
            },
            value @ (Value::Object(_) | Value::Array(_)) => OracleOutcome::Parsed(value),
            Value::Null => OracleOutcome::Malformed("empty response".to_string()),
            other => OracleOutcome::Malformed(format!("expected JSON, got {}", other)),
        }
    }
}

impl std::fmt::Debug for Oracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Oracle")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::ScriptedProvider;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Answer {
        recommended_version: String,
    }

    #[tokio::test]
    async fn test_disabled_is_unavailable() {
        let outcome = Oracle::disabled().ask("p", &Value::Null).await;
        assert!(matches!(outcome, OracleOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_structured_content_is_parsed() {
        let oracle = Oracle::with_provider(ScriptedProvider::always(json!({"a": 1})).shared());
        assert_eq!(
            oracle.ask("p", &Value::Null).await,
            OracleOutcome::Parsed(json!({"a": 1}))
        );
    }

    #[tokio::test]
    async fn test_fenced_text_is_parsed() {
        let oracle = Oracle::with_provider(
            ScriptedProvider::text("```json\n{\"recommendedVersion\": \"13.0.3\"}\n```").shared(),
        );
        let reply: OracleReply<Answer> = oracle.ask_for("p", &Value::Null).await;
        assert_eq!(
            reply,
            OracleReply::Ok(Answer {
                recommended_version: "13.0.3".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_prose_is_malformed() {
        let oracle = Oracle::with_provider(ScriptedProvider::text("No idea, sorry.").shared());
        assert!(matches!(
            oracle.ask("p", &Value::Null).await,
            OracleOutcome::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let oracle = Oracle::with_provider(ScriptedProvider::always(json!({"other": 1})).shared());
        let reply: OracleReply<Answer> = oracle.ask_for("p", &Value::Null).await;
        assert!(matches!(reply, OracleReply::Malformed(_)));
        assert!(matches!(
            reply.into_result(),
            Err(NuplanError::OracleMalformed(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_error_is_unavailable() {
        let oracle = Oracle::with_provider(ScriptedProvider::failing("boom").shared());
        let reply: OracleReply<Answer> = oracle.ask_for("p", &Value::Null).await;
        assert!(matches!(reply, OracleReply::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let slow = ScriptedProvider::always(json!({}))
            .with_delay(Duration::from_millis(200))
            .shared();
        let oracle = Oracle::new(Some(slow), Duration::from_millis(10));
        match oracle.ask("p", &Value::Null).await {
            OracleOutcome::Unavailable(reason) => assert!(reason.contains("oracle request")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }
}
