//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, the solution
//! being worked on, and the collaborators built from them.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::Oracle;
use crate::config::{Config, ConfigLoader};
use crate::dotnet::{DotnetCli, SharedPackageManager, find_solution};
use crate::types::Result;
use crate::upgrade::UpgradeWorkflow;

/// How a command prints its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        *self == Self::Json
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format '{}'. Valid values: text, json", s)),
        }
    }
}

/// Command execution context
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    /// Resolved `.sln` (or single `.csproj`)
    pub solution_path: PathBuf,
    pub package_manager: SharedPackageManager,
    pub oracle: Oracle,
}

impl CommandContext {
    /// Load config, locate the solution and build the collaborators.
    ///
    /// `solution` may be a file or a directory to search; `None` searches the
    /// current directory.
    pub fn load(config_path: Option<&Path>, solution: Option<&Path>, no_ai: bool) -> Result<Self> {
        let mut config = ConfigLoader::load(config_path)?;
        if no_ai {
            config.llm.enabled = false;
        }

        let search_root = match solution {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let solution_path = find_solution(&search_root)?;
        let oracle = Oracle::from_config(&config.llm)?;
        let package_manager: SharedPackageManager = Arc::new(DotnetCli::new(&config));

        Ok(Self {
            config,
            solution_path,
            package_manager,
            oracle,
        })
    }

    pub fn workflow(&self) -> UpgradeWorkflow {
        UpgradeWorkflow::new(
            self.config.clone(),
            Arc::clone(&self.package_manager),
            self.oracle.clone(),
        )
    }
}

/// Pretty-printed JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
