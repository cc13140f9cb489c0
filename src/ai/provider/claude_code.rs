//! Claude Code CLI Provider
//!
//! Runs the local `claude` CLI in print mode and returns its reply. Retry and
//! fallback belong to `ProviderChain`; this provider is single-shot.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{LlmProvider, LlmResponse, ProviderConfig, TokenUsage};
use crate::types::{NuplanError, Result};

const CLI: &str = "claude";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct ClaudeCodeProvider {
    model: String,
    timeout_secs: u64,
    temperature: f32,
}

impl ClaudeCodeProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            model: config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
        }
    }

    async fn execute(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        let start = Instant::now();

        let mut cmd = Command::new(CLI);
        cmd.arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("json")
            .arg("--model")
            .arg(&self.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !schema.is_null() {
            cmd.arg("--json-schema").arg(serde_json::to_string(schema)?);
        }
        cmd.env("CLAUDE_CODE_TEMPERATURE", self.temperature.to_string());

        let child = cmd.spawn().map_err(|e| {
            NuplanError::LlmApi(format!(
                "Failed to spawn Claude Code CLI: {}. Is it installed?",
                e
            ))
        })?;

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            NuplanError::LlmApi(format!(
                "Claude Code timed out after {}s",
                self.timeout_secs
            ))
        })?
        .map_err(|e| NuplanError::LlmApi(format!("Claude Code execution failed: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            if let Ok(envelope) = serde_json::from_str::<Value>(&stdout)
                && envelope
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            {
                let message = envelope
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown API error");
                return Err(NuplanError::LlmApi(format!(
                    "Claude Code API error: {}",
                    message
                )));
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                "Process exited with non-zero status"
            } else {
                stderr.trim()
            };
            return Err(NuplanError::LlmApi(format!(
                "Claude Code failed: {}",
                message
            )));
        }

        let envelope: Value = serde_json::from_str(&stdout).map_err(|e| {
            NuplanError::LlmApi(format!("Failed to parse Claude Code output: {}", e))
        })?;

        Ok(LlmResponse {
            content: Self::extract_content(&envelope)?,
            usage: Self::extract_usage(&envelope),
            cost_usd: envelope
                .get("total_cost_usd")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            elapsed_ms: start.elapsed().as_millis() as u64,
            provider: "claude-code".to_string(),
            model: self.model.clone(),
        })
    }

    /// `structured_output` when the CLI validated a schema, else the raw `result`
    fn extract_content(envelope: &Value) -> Result<Value> {
        if let Some(structured) = envelope.get("structured_output")
            && !structured.is_null()
        {
            debug!("Got structured_output from Claude Code");
            return Ok(structured.clone());
        }
        match envelope.get("result") {
            Some(Value::String(text)) => Ok(Value::String(text.clone())),
            Some(value @ (Value::Object(_) | Value::Array(_))) => Ok(value.clone()),
            _ => Err(NuplanError::LlmApi(
                "No result in Claude Code response".to_string(),
            )),
        }
    }

    fn extract_usage(envelope: &Value) -> TokenUsage {
        let field = |name: &str| {
            envelope
                .get("usage")
                .and_then(|u| u.get(name))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32
        };
        TokenUsage {
            input_tokens: field("input_tokens"),
            output_tokens: field("output_tokens"),
        }
    }
}

#[async_trait]
impl LlmProvider for ClaudeCodeProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        info!(
            "Generating with Claude Code CLI (model: {}, temperature: {})",
            self.model, self.temperature
        );
        self.execute(prompt, schema).await
    }

    fn name(&self) -> &str {
        "claude-code"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let output = Command::new(CLI)
            .arg("--version")
            .output()
            .await
            .map_err(|e| NuplanError::LlmApi(format!("Claude Code not found: {}", e)))?;
        Ok(output.status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_content_prefers_structured_output() {
        let envelope = json!({
            "result": "ignored",
            "structured_output": {"recommendedVersion": "13.0.3"}
        });
        let content = ClaudeCodeProvider::extract_content(&envelope).unwrap();
        assert_eq!(content["recommendedVersion"], "13.0.3");
    }

    #[test]
    fn test_extract_content_keeps_raw_text() {
        let envelope = json!({"result": "```json\n{\"a\": 1}\n```"});
        let content = ClaudeCodeProvider::extract_content(&envelope).unwrap();
        assert!(content.as_str().unwrap().starts_with("```json"));
    }

    #[test]
    fn test_extract_content_missing() {
        assert!(ClaudeCodeProvider::extract_content(&json!({"usage": {}})).is_err());
    }

    #[test]
    fn test_extract_usage() {
        let envelope = json!({"usage": {"input_tokens": 1000, "output_tokens": 500}});
        let usage = ClaudeCodeProvider::extract_usage(&envelope);
        assert_eq!(usage.total(), 1500);
    }

    #[test]
    fn test_default_model() {
        let provider = ClaudeCodeProvider::new(ProviderConfig::default());
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }
}
