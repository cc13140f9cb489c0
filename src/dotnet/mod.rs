//! `dotnet` CLI integration
//!
//! - `runner`: process execution seam
//! - `cli`: `PackageManager` trait and its `dotnet` implementation
//! - `parser`: CLI output to records
//! - `project`: solution and project file extraction
//! - `registry`: NuGet registration metadata

pub mod cli;
pub mod parser;
pub mod project;
pub mod registry;
pub mod runner;

pub use cli::{DotnetCli, PackageManager, SharedPackageManager};
pub use parser::{
    ListedPackage, PackageListing, parse_outdated, parse_package_list, parse_restore_output,
};
pub use project::{
    SolutionProject, find_solution, parse_package_references, parse_solution,
    read_package_references, solution_projects,
};
pub use registry::{DependencyGroup, PackageMetadata, RegistryClient};
pub use runner::{CommandOutput, CommandRunner, TokioCommandRunner};
