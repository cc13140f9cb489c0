//! Prompt helpers shared by providers.

use serde_json::Value;

/// System instruction shared by chat-style providers
pub const SYSTEM_ROLE: &str =
    "You are a .NET dependency management expert. Always respond with valid JSON.";

/// Append JSON schema instructions to a prompt.
///
/// Returns the original prompt if schema is null.
pub fn build_schema_prompt(user_prompt: &str, schema: &Value) -> String {
    if schema.is_null() {
        return user_prompt.to_string();
    }

    let schema_str = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!(
        "{}\n\n---\n\nRespond with valid JSON matching this schema:\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
        user_prompt, schema_str
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_schema_prompt_null_schema() {
        let prompt = "Group these packages";
        assert_eq!(build_schema_prompt(prompt, &Value::Null), prompt);
    }

    #[test]
    fn test_build_schema_prompt_with_schema() {
        let schema = json!({"type": "object", "required": ["recommendedVersion"]});
        let result = build_schema_prompt("Resolve the conflict", &schema);
        assert!(result.starts_with("Resolve the conflict"));
        assert!(result.contains("recommendedVersion"));
        assert!(result.contains("ONLY with valid JSON"));
    }
}
