//! Shared utility functions for type serialization and common operations.
//!
//! ## JSON Extraction Helpers
//!
//! Provides ergonomic helpers for extracting values from `serde_json::Value`:
//! - `json_string` - Extract strings
//! - `json_string_array` - Extract string arrays
//! - `json_f64` - Extract numbers

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract string array from JSON value by key.
#[inline]
pub fn json_string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract f64, accepting numeric strings.
#[inline]
pub fn json_f64(value: &serde_json::Value, key: &str) -> Option<f64> {
    let v = value.get(key)?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

// =============================================================================
// String Utilities
// =============================================================================

/// Capitalize the first character of a string.
#[inline]
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Lowercase, dash-separated identifier fragment
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// First `max` characters of `s`, for log previews
pub fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_helpers() {
        let v = json!({"name": "x", "tags": ["a", 1, "b"], "confidence": "0.75"});
        assert_eq!(json_string(&v, "name").as_deref(), Some("x"));
        assert_eq!(json_string(&v, "missing"), None);
        assert_eq!(json_string_array(&v, "tags"), vec!["a", "b"]);
        assert_eq!(json_f64(&v, "confidence"), Some(0.75));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Microsoft.Extensions"), "microsoft-extensions");
        assert_eq!(slugify("  AWS SDK  "), "aws-sdk");
        assert_eq!(slugify("Newtonsoft.Json Ecosystem"), "newtonsoft-json-ecosystem");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello world", 5), "hello...");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("serilog"), "Serilog");
        assert_eq!(capitalize_first(""), "");
    }
}
