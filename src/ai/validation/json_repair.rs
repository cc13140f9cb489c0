//! Tolerant JSON extraction for oracle replies
//!
//! Chat models wrap JSON in prose, fence it in markdown, truncate it, or leave
//! trailing commas. Parsing happens in stages, cheapest first:
//!
//! 1. strip a markdown fence (anywhere in the text) and a BOM
//! 2. strict parse
//! 3. repairs of increasing aggressiveness
//! 4. the first balanced `{...}` or `[...]` in the text

use serde_json::Value;
use tracing::debug;

use crate::constants::oracle::PREVIEW_CHARS;
use crate::types::{NuplanError, Result, preview};

/// How the value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Parsed as-is after fence stripping
    Clean,
    /// Parsed after a repair pass
    Repaired,
    /// Pulled out of surrounding prose
    Extracted,
}

/// Extract and parse JSON from a raw reply
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    JsonRepairer::new().parse_or_repair(content).map(|(v, _)| v)
}

// =============================================================================
// Bracket scanning
// =============================================================================

/// Tracks string/escape state and nesting depth over JSON-ish text
#[derive(Default)]
struct BracketScan {
    depth: i32,
    in_string: bool,
    escape: bool,
    stack: Vec<char>,
}

impl BracketScan {
    /// Feed one char; returns true when it closed a top-level value
    fn feed(&mut self, ch: char) -> bool {
        if self.escape {
            self.escape = false;
            return false;
        }
        match ch {
            '\\' if self.in_string => self.escape = true,
            '"' => self.in_string = !self.in_string,
            '{' | '[' if !self.in_string => {
                self.depth += 1;
                self.stack.push(if ch == '{' { '}' } else { ']' });
            }
            '}' | ']' if !self.in_string => {
                self.depth -= 1;
                self.stack.pop();
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

// =============================================================================
// JsonRepairer
// =============================================================================

pub struct JsonRepairer {
    max_repair_level: usize,
}

impl Default for JsonRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRepairer {
    pub fn new() -> Self {
        Self {
            max_repair_level: 3,
        }
    }

    /// Parse JSON, repairing or extracting when a strict parse fails
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, RepairOutcome)> {
        let cleaned = Self::preprocess(raw);
        if cleaned.is_empty() {
            return Err(NuplanError::OracleMalformed("empty response".to_string()));
        }

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok((value, RepairOutcome::Clean));
        }

        // Repairs only make sense when the text starts like JSON
        if cleaned.starts_with(['{', '[']) {
            for level in 1..=self.max_repair_level {
                let repaired = Self::repair(&cleaned, level);
                if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
                    debug!("JSON repaired at level {}", level);
                    return Ok((value, RepairOutcome::Repaired));
                }
            }
        }

        if let Some(extracted) = Self::first_balanced(&cleaned) {
            let candidate = Self::fix_trailing_commas(extracted);
            if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                debug!("JSON extracted from mixed content");
                return Ok((value, RepairOutcome::Extracted));
            }
        }

        Err(NuplanError::OracleMalformed(format!(
            "no parseable JSON in response: {}",
            preview(&cleaned, PREVIEW_CHARS)
        )))
    }

    /// Strip BOM, whitespace and a markdown fence
    pub fn preprocess(raw: &str) -> String {
        let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
        Self::strip_fence(trimmed).trim().to_string()
    }

    /// Body of the first ``` fence, or the input when there is none
    fn strip_fence(s: &str) -> &str {
        let Some(open) = s.find("```") else {
            return s;
        };
        let after = &s[open + 3..];
        // Skip the info string (`json`, `JSON`, ...)
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        match body.find("```") {
            Some(close) => &body[..close],
            None => body,
        }
    }

    fn repair(s: &str, level: usize) -> String {
        let mut result = Self::fix_trailing_commas(s);
        if level >= 3 {
            result = result
                .chars()
                .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
                .collect();
        }
        if level >= 2 {
            result = Self::close_strings_at_newline(&result);
        }
        result = Self::balance(&result);
        if level >= 3 {
            result = Self::truncate_to_last_complete(&result).to_string();
        }
        result
    }

    fn fix_trailing_commas(s: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        let mut out = String::with_capacity(s.len());
        let mut in_string = false;
        let mut escape = false;
        for (i, &ch) in chars.iter().enumerate() {
            if escape {
                escape = false;
            } else if ch == '\\' && in_string {
                escape = true;
            } else if ch == '"' {
                in_string = !in_string;
            } else if ch == ',' && !in_string {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            out.push(ch);
        }
        out
    }

    /// Close an unterminated string and every open bracket, innermost first
    fn balance(s: &str) -> String {
        let mut scan = BracketScan::default();
        for ch in s.chars() {
            scan.feed(ch);
        }
        let mut out = s.to_string();
        if scan.in_string {
            out.push('"');
        }
        while let Some(closer) = scan.stack.pop() {
            out.push(closer);
        }
        out
    }

    fn close_strings_at_newline(s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 8);
        let mut in_string = false;
        let mut escape = false;
        for ch in s.chars() {
            if escape {
                escape = false;
            } else if ch == '\\' && in_string {
                escape = true;
            } else if ch == '"' {
                in_string = !in_string;
            } else if matches!(ch, '\n' | '\r') && in_string {
                out.push('"');
                in_string = false;
            }
            out.push(ch);
        }
        if in_string {
            out.push('"');
        }
        out
    }

    fn truncate_to_last_complete(s: &str) -> &str {
        let mut scan = BracketScan::default();
        let mut last = 0;
        for (i, ch) in s.char_indices() {
            if scan.feed(ch) {
                last = i + ch.len_utf8();
            }
        }
        if last > 0 { &s[..last] } else { s }
    }

    /// First balanced object or array in `s`
    pub fn first_balanced(s: &str) -> Option<&str> {
        let start = s.find(['{', '['])?;
        let mut scan = BracketScan::default();
        for (i, ch) in s[start..].char_indices() {
            if scan.feed(ch) {
                return Some(&s[start..start + i + ch.len_utf8()]);
            }
        }
        None
    }
}
