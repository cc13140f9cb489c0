//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (per-user config dir) and project (.nuplan/) level configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{families, oracle, process, registry};
use crate::types::{FamilyUpdateStrategy, NuplanError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Oracle (LLM provider) settings
    pub llm: LlmConfig,

    /// Package family detection settings
    pub families: FamiliesConfig,

    /// Version conflict analysis settings
    pub conflicts: ConflictsConfig,

    /// Upgrade execution settings
    pub upgrade: UpgradeConfig,

    /// NuGet registry metadata settings
    pub registry: RegistryConfig,

    /// `dotnet` CLI settings
    pub dotnet: DotnetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            families: FamiliesConfig::default(),
            conflicts: ConflictsConfig::default(),
            upgrade: UpgradeConfig::default(),
            registry: RegistryConfig::default(),
            dotnet: DotnetConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `NuplanError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(NuplanError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(NuplanError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.families.min_confidence) {
            return Err(NuplanError::Config(format!(
                "families.min_confidence must be between 0.0 and 1.0, got {}",
                self.families.min_confidence
            )));
        }

        if self.families.min_family_size < 1 {
            return Err(NuplanError::Config(
                "families.min_family_size must be at least 1".to_string(),
            ));
        }

        for (name, secs) in [
            ("upgrade.upgrade_timeout_secs", self.upgrade.upgrade_timeout_secs),
            ("upgrade.restore_timeout_secs", self.upgrade.restore_timeout_secs),
            ("upgrade.list_timeout_secs", self.upgrade.list_timeout_secs),
            ("registry.timeout_secs", self.registry.timeout_secs),
            ("dotnet.probe_timeout_secs", self.dotnet.probe_timeout_secs),
        ] {
            if secs == 0 {
                return Err(NuplanError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.dotnet.executable.trim().is_empty() {
            return Err(NuplanError::Config(
                "dotnet.executable must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether the oracle is consulted at all
    pub enabled: bool,

    /// Provider name (claude-code, openai)
    pub provider: String,

    /// Model name
    pub model: String,

    /// Request timeout in seconds; expiry counts as "oracle unavailable"
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Retries per provider before moving down the chain
    pub max_retries: u8,

    /// Fallback provider for retry chain
    pub fallback_provider: Option<String>,

    /// Fallback model for retry chain
    pub fallback_model: Option<String>,

    /// Override for OpenAI-compatible endpoints
    pub api_base: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "claude-code".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout_secs: oracle::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            max_retries: crate::constants::chain::DEFAULT_MAX_RETRIES,
            fallback_provider: None,
            fallback_model: None,
            api_base: None,
        }
    }
}

// =============================================================================
// Family Detection Configuration
// =============================================================================

/// A user-supplied regex that forms a family from every matching package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPattern {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub update_strategy: FamilyUpdateStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FamiliesConfig {
    /// Minimum members for an auto-detected family
    pub min_family_size: usize,

    /// Minimum confidence for an auto-detected family
    pub min_confidence: f32,

    pub enable_pattern: bool,
    pub enable_dependency: bool,
    pub enable_metadata: bool,
    pub enable_ai: bool,

    /// Extra regex-defined families
    pub custom_patterns: Vec<CustomPattern>,

    /// package name -> family name; always wins over detection
    pub manual_overrides: BTreeMap<String, String>,

    /// Ecosystem roots that earn a confidence bonus in dependency detection
    pub well_known_roots: Vec<String>,
}

impl Default for FamiliesConfig {
    fn default() -> Self {
        Self {
            min_family_size: families::DEFAULT_MIN_FAMILY_SIZE,
            min_confidence: families::DEFAULT_MIN_CONFIDENCE,
            enable_pattern: true,
            enable_dependency: true,
            enable_metadata: true,
            enable_ai: true,
            custom_patterns: Vec::new(),
            manual_overrides: BTreeMap::new(),
            well_known_roots: families::DEFAULT_WELL_KNOWN_ROOTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// =============================================================================
// Conflict Analysis Configuration
// =============================================================================

/// A compatibility note attached whenever a matching package is analyzed.
///
/// `package` matches exactly (case-insensitive), or as a prefix when it ends in `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownConstraint {
    pub package: String,
    pub note: String,
}

impl KnownConstraint {
    pub fn new(package: &str, note: &str) -> Self {
        Self {
            package: package.to_string(),
            note: note.to_string(),
        }
    }

    pub fn matches(&self, package_name: &str) -> bool {
        let pattern = self.package.to_lowercase();
        let name = package_name.to_lowercase();
        match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == pattern,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    pub known_constraints: Vec<KnownConstraint>,
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            known_constraints: vec![
                KnownConstraint::new(
                    "Microsoft.EntityFrameworkCore*",
                    "All Microsoft.EntityFrameworkCore.* packages must share one version",
                ),
                KnownConstraint::new(
                    "Microsoft.AspNetCore*",
                    "ASP.NET Core package majors track the target framework version",
                ),
                KnownConstraint::new(
                    "Microsoft.Extensions*",
                    "Microsoft.Extensions.* packages are released together; mixing majors causes NU1605 downgrades",
                ),
                KnownConstraint::new(
                    "Newtonsoft.Json",
                    "Many libraries require Newtonsoft.Json >= 13.0.1; older pins surface as NU1605 downgrade errors",
                ),
            ],
        }
    }
}

// =============================================================================
// Upgrade Configuration
// =============================================================================

/// Which plan `upgrade` executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyChoice {
    #[default]
    FamilyFirst,
    Conservative,
    AllAtOnce,
    /// Oracle-recommended ordering, with deterministic fallback
    Ai,
}

impl std::fmt::Display for StrategyChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyChoice::FamilyFirst => write!(f, "family-first"),
            StrategyChoice::Conservative => write!(f, "conservative"),
            StrategyChoice::AllAtOnce => write!(f, "all-at-once"),
            StrategyChoice::Ai => write!(f, "ai"),
        }
    }
}

impl std::str::FromStr for StrategyChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "family-first" | "family" => Ok(StrategyChoice::FamilyFirst),
            "conservative" => Ok(StrategyChoice::Conservative),
            "all-at-once" | "all" => Ok(StrategyChoice::AllAtOnce),
            "ai" => Ok(StrategyChoice::Ai),
            _ => Err(format!(
                "Unknown strategy: {}. Valid values: family-first, conservative, all-at-once, ai",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Keep updates that bump the major version
    pub allow_breaking_changes: bool,

    /// Timeout for one `dotnet add package` (seconds)
    pub upgrade_timeout_secs: u64,

    /// Timeout for `dotnet restore` (seconds)
    pub restore_timeout_secs: u64,

    /// Timeout for listing commands (seconds)
    pub list_timeout_secs: u64,

    /// Strategy used when `--strategy` is not given
    pub strategy: StrategyChoice,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            allow_breaking_changes: true,
            upgrade_timeout_secs: process::UPGRADE_TIMEOUT_SECS,
            restore_timeout_secs: process::RESTORE_TIMEOUT_SECS,
            list_timeout_secs: process::LIST_TIMEOUT_SECS,
            strategy: StrategyChoice::default(),
        }
    }
}

// =============================================================================
// Registry Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Fetch authors, tags and dependency ranges from the registry
    pub enabled: bool,

    /// Registration resource base URL
    pub base_url: String,

    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: registry::DEFAULT_REGISTRATION_BASE.to_string(),
            timeout_secs: registry::TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// dotnet Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DotnetConfig {
    /// Executable name or path
    pub executable: String,

    /// Resolve each package's closure in a scratch project
    pub probe_dependencies: bool,

    /// Target framework of the scratch project
    pub probe_framework: String,

    pub probe_timeout_secs: u64,
}

impl Default for DotnetConfig {
    fn default() -> Self {
        Self {
            executable: process::DEFAULT_DOTNET.to_string(),
            probe_dependencies: false,
            probe_framework: "net8.0".to_string(),
            probe_timeout_secs: process::PROBE_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "claude-code");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.families.min_family_size, 2);
        assert!(config.upgrade.allow_breaking_changes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.families.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.families.min_family_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upgrade.restore_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_choice() {
        assert_eq!(StrategyChoice::AllAtOnce.to_string(), "all-at-once");
        assert_eq!(
            "Conservative".parse::<StrategyChoice>().unwrap(),
            StrategyChoice::Conservative
        );
        assert!("yolo".parse::<StrategyChoice>().is_err());
    }

    #[test]
    fn test_known_constraint_matching() {
        let prefix = KnownConstraint::new("Microsoft.EntityFrameworkCore*", "n");
        assert!(prefix.matches("Microsoft.EntityFrameworkCore.SqlServer"));
        assert!(!prefix.matches("Microsoft.Extensions.Logging"));

        let exact = KnownConstraint::new("Newtonsoft.Json", "n");
        assert!(exact.matches("newtonsoft.json"));
        assert!(!exact.matches("Newtonsoft.Json.Bson"));
    }
}
