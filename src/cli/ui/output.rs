use console::{StyledObject, style};

use crate::types::{ConflictSeverity, RestoreErrorKind, RiskLevel};

/// Styled terminal output for human-readable command results
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Indented list entry
    pub fn item(&self, message: &str) {
        println!("  • {}", message);
    }

    /// Dimmed secondary line under an item
    pub fn detail(&self, message: &str) {
        println!("    {}", style(message).dim());
    }

    pub fn key_value(&self, key: &str, value: &str) {
        println!("  {:<14} {}", style(key).cyan(), value);
    }

    pub fn risk(&self, risk: RiskLevel) -> StyledObject<String> {
        let label = risk.to_string();
        match risk {
            RiskLevel::Low => style(label).green(),
            RiskLevel::Medium => style(label).yellow(),
            RiskLevel::High => style(label).red(),
        }
    }

    pub fn severity(&self, severity: ConflictSeverity) -> StyledObject<String> {
        let label = severity.to_string();
        match severity {
            ConflictSeverity::Minor => style(label).green(),
            ConflictSeverity::Major => style(label).yellow(),
            ConflictSeverity::Critical => style(label).red().bold(),
        }
    }

    pub fn restore_kind(&self, kind: RestoreErrorKind) -> StyledObject<&'static str> {
        match kind {
            RestoreErrorKind::Error => style("error").red(),
            RestoreErrorKind::Warning => style("warning").yellow(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
