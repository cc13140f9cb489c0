//! Solution analysis
//!
//! - [`graph`]: per-package aggregation, conflicts and critical paths
//! - [`families`]: related-package clustering
//! - [`conflict`]: oracle-backed version conflict resolution

pub mod conflict;
pub mod families;
pub mod graph;

pub use conflict::{VersionConflictAnalyzer, validate_recommended_version};
pub use families::FamilyDetector;
pub use graph::DependencyGraphBuilder;
