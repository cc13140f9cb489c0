//! Config Command
//!
//! Manage nuplan configuration.
//!
//! Usage:
//!   nuplan config show [-g] [-f toml|json|yaml]
//!   nuplan config path
//!   nuplan config init [-g] [--force]

use std::path::Path;

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged configuration, or the raw global file with `global`
pub fn show(config_path: Option<&Path>, global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'nuplan config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    let config = ConfigLoader::load(config_path)?;
    println!("{}", ConfigLoader::render(&config, format)?);
    Ok(())
}

/// Show configuration file locations and whether they exist
pub fn path(config_path: Option<&Path>) -> Result<()> {
    let out = Output::new();
    let exists = |p: &Path| if p.exists() { "" } else { " (missing)" };

    match ConfigLoader::global_config_path() {
        Some(global) => out.key_value("Global", &format!("{}{}", global.display(), exists(&global))),
        None => out.key_value("Global", "unavailable"),
    }
    let project = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigLoader::project_config_path);
    out.key_value("Project", &format!("{}{}", project.display(), exists(&project)));
    out.key_value("Environment", "NUPLAN_<SECTION>__<KEY>");
    Ok(())
}

/// Write a default config file
pub fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(&std::env::current_dir()?, force)?
    };
    Output::new().success(&format!("Configuration at {}", path.display()));
    Ok(())
}
