//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (per-user config dir, `config.toml`)
//! 3. Project config (.nuplan/config.toml, or an explicit path)
//! 4. Environment variables (NUPLAN_* prefix, `__` separates sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{NuplanError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project (or `explicit`) → env vars
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let config: Config = Self::figment(explicit)
            .extract()
            .map_err(|e| NuplanError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// The merged provider chain, without extraction
    pub fn figment(explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::project_config_path);
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // NUPLAN_FAMILIES__MIN_FAMILY_SIZE -> families.min_family_size
        figment.merge(Env::prefixed("NUPLAN_").split("__").lowercase(true))
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| NuplanError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Per-user config directory (XDG on Linux, Application Support on macOS)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "nuplan").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".nuplan")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render a config in `toml`, `json` or `yaml`
    pub fn render(config: &Config, format: &str) -> Result<String> {
        match format {
            "json" => Ok(serde_json::to_string_pretty(config)?),
            "yaml" => Ok(serde_yaml::to_string(config)?),
            _ => toml::to_string_pretty(config).map_err(|e| NuplanError::Config(e.to_string())),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write the default global config; returns its path
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            NuplanError::Config("Cannot determine global config directory".to_string())
        })?;
        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        Self::write_default(&config_path, force)?;
        Ok(config_path)
    }

    /// Write the default project config under `root`; returns its path
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        Self::write_default(&config_path, force)?;
        Ok(config_path)
    }

    fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            info!("Config exists: {}", path.display());
            return Ok(());
        }
        fs::write(path, Self::default_config_template())?;
        info!("Created config: {}", path.display());
        Ok(())
    }

    fn default_config_template() -> &'static str {
        r#"# nuplan configuration
# Project settings in .nuplan/config.toml override the global file.
# Environment variables override both: NUPLAN_LLM__MODEL, NUPLAN_UPGRADE__STRATEGY, ...

version = "1.0"

[llm]
enabled = true
provider = "claude-code"
model = "claude-sonnet-4-20250514"
timeout_secs = 60

[families]
min_family_size = 2
min_confidence = 0.3
# custom_patterns = [{ name = "Internal", pattern = "^Contoso\\." }]

[families.manual_overrides]
# "Polly" = "Resilience"

[upgrade]
allow_breaking_changes = true
strategy = "family-first"

[registry]
enabled = false

[dotnet]
executable = "dotnet"
probe_dependencies = false
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyChoice;
    use figment::Jail;

    #[test]
    fn test_project_file_and_env_override() {
        Jail::expect_with(|jail| {
            jail.create_dir(".nuplan")?;
            jail.create_file(
                ".nuplan/config.toml",
                r#"
                [families]
                min_family_size = 3

                [upgrade]
                strategy = "conservative"
                "#,
            )?;
            jail.set_env("NUPLAN_LLM__MODEL", "test-model");
            jail.set_env("NUPLAN_UPGRADE__ALLOW_BREAKING_CHANGES", "false");

            let config: Config = ConfigLoader::figment(None).extract()?;
            assert_eq!(config.families.min_family_size, 3);
            assert_eq!(config.upgrade.strategy, StrategyChoice::Conservative);
            assert_eq!(config.llm.model, "test-model");
            assert!(!config.upgrade.allow_breaking_changes);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_path_wins_over_project_dir() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [llm]
                enabled = false
                "#,
            )?;
            let config: Config = ConfigLoader::figment(Some(Path::new("custom.toml"))).extract()?;
            assert!(!config.llm.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_file_validates() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[families]\nmin_confidence = 4.0\n").unwrap();
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, NuplanError::Config(_)));
    }

    #[test]
    fn test_init_project_writes_loadable_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = ConfigLoader::init_project(dir.path(), false).unwrap();
        assert!(path.exists());
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.upgrade.strategy, StrategyChoice::FamilyFirst);
    }

    #[test]
    fn test_render_formats() {
        let config = Config::default();
        assert!(ConfigLoader::render(&config, "toml").unwrap().contains("[llm]"));
        assert!(ConfigLoader::render(&config, "json").unwrap().contains("\"llm\""));
        assert!(ConfigLoader::render(&config, "yaml").unwrap().contains("llm:"));
    }
}
