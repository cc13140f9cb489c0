//! nuplan - AI-assisted NuGet upgrade planner
//!
//! Discovers outdated NuGet packages in a .NET solution through the `dotnet`
//! CLI, groups related packages into families, proposes phased upgrade
//! strategies and executes them, reporting restore diagnostics at the end.
//!
//! ## Core Features
//!
//! - **Family Detection**: pattern, dependency, metadata and AI detectors with
//!   merging and manual overrides
//! - **Dependency Graph**: per-package view across projects with version
//!   conflicts and critical paths
//! - **Strategies**: Family-First, Conservative and All-at-Once plans, plus an
//!   oracle-recommended ordering with a deterministic fallback
//! - **Provider Chain**: multiple LLM backends with fallback support
//!
//! ## Quick Start
//!
//! ```ignore
//! use nuplan::{Config, Oracle, UpgradeWorkflow, config::StrategyChoice};
//! use nuplan::dotnet::DotnetCli;
//!
//! let config = Config::default();
//! let workflow = UpgradeWorkflow::new(
//!     config.clone(),
//!     Arc::new(DotnetCli::new(&config)),
//!     Oracle::from_config(&config.llm)?,
//! );
//! let plan = workflow.plan(Path::new("App.sln"), StrategyChoice::FamilyFirst).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: LLM providers and the oracle adapter
//! - [`analysis`]: dependency graph, families, version conflicts
//! - [`dotnet`]: `dotnet` CLI integration, output parsing, registry client
//! - [`upgrade`]: strategies, execution, workflow
//! - [`config`]: layered configuration

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dotnet;
pub mod types;
pub mod upgrade;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, NuplanError, Result};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use ai::{Oracle, OracleOutcome, OracleReply};
pub use analysis::{DependencyGraphBuilder, FamilyDetector, VersionConflictAnalyzer};
pub use dotnet::{DotnetCli, PackageManager};
pub use upgrade::{UpgradeExecutor, UpgradeStrategist, UpgradeWorkflow};
