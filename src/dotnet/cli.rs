//! Package manager over the `dotnet` CLI

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::parser::{PackageListing, parse_outdated, parse_package_list, parse_restore_output};
use super::runner::{CommandOutput, CommandRunner, TokioCommandRunner};
use crate::config::Config;
use crate::types::{NuplanError, PackageUpdate, RestoreError, Result, preview};

/// Operations the planner needs from a NuGet-aware package manager
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Outdated packages of a solution or project
    async fn list_outdated(
        &self,
        target: &Path,
        include_transitive: bool,
    ) -> Result<Vec<PackageUpdate>>;

    /// Resolved package references of one project
    async fn list_packages(&self, project: &Path, include_transitive: bool)
    -> Result<PackageListing>;

    async fn add_package(&self, project: &Path, name: &str, version: &str) -> Result<()>;

    /// Restore and return the diagnostics it printed. `Err` means the restore
    /// itself could not be run.
    async fn restore(&self, solution: &Path) -> Result<Vec<RestoreError>>;

    /// Transitive closure of one package, resolved in a throwaway project
    async fn probe_dependencies(&self, name: &str, version: &str) -> Result<PackageListing>;
}

pub type SharedPackageManager = Arc<dyn PackageManager>;

#[derive(Debug, Clone)]
struct Timeouts {
    list: Duration,
    upgrade: Duration,
    restore: Duration,
    probe: Duration,
}

pub struct DotnetCli {
    runner: Arc<dyn CommandRunner>,
    executable: String,
    probe_framework: String,
    timeouts: Timeouts,
}

impl DotnetCli {
    pub fn new(config: &Config) -> Self {
        Self::with_runner(Arc::new(TokioCommandRunner), config)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        Self {
            runner,
            executable: config.dotnet.executable.clone(),
            probe_framework: config.dotnet.probe_framework.clone(),
            timeouts: Timeouts {
                list: Duration::from_secs(config.upgrade.list_timeout_secs),
                upgrade: Duration::from_secs(config.upgrade.upgrade_timeout_secs),
                restore: Duration::from_secs(config.upgrade.restore_timeout_secs),
                probe: Duration::from_secs(config.dotnet.probe_timeout_secs),
            },
        }
    }

    async fn dotnet(
        &self,
        args: Vec<String>,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        self.runner.run(&self.executable, &args, cwd, timeout).await
    }

    /// Run a command whose failure must stop the caller
    async fn dotnet_checked(
        &self,
        args: Vec<String>,
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let action = args.first().cloned().unwrap_or_default();
        let output = self.dotnet(args, cwd, timeout).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(NuplanError::process(
                format!("{} {}", self.executable, action),
                failure_message(&output),
            ))
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn failure_message(output: &CommandOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    if text.is_empty() {
        format!("exit status {:?}", output.status_code)
    } else {
        preview(text, 500)
    }
}

#[async_trait]
impl PackageManager for DotnetCli {
    #[instrument(skip(self, target), fields(path = %target.display()))]
    async fn list_outdated(
        &self,
        target: &Path,
        include_transitive: bool,
    ) -> Result<Vec<PackageUpdate>> {
        let mut args = vec![
            "list".to_string(),
            path_arg(target),
            "package".to_string(),
            "--outdated".to_string(),
        ];
        if include_transitive {
            args.push("--include-transitive".to_string());
        }

        let output = self.dotnet(args, None, self.timeouts.list).await?;
        if !output.success() {
            warn!(
                "dotnet list exited with {:?}; parsing output anyway",
                output.status_code
            );
        }

        let updates = parse_outdated(&output.stdout, Some(&path_arg(target)));
        debug!("{} outdated packages in {}", updates.len(), target.display());
        Ok(updates)
    }

    async fn list_packages(
        &self,
        project: &Path,
        include_transitive: bool,
    ) -> Result<PackageListing> {
        let mut args = vec![
            "list".to_string(),
            path_arg(project),
            "package".to_string(),
        ];
        if include_transitive {
            args.push("--include-transitive".to_string());
        }

        let output = self.dotnet(args, None, self.timeouts.list).await?;
        if !output.success() {
            warn!(
                "dotnet list exited with {:?}; parsing output anyway",
                output.status_code
            );
        }
        Ok(parse_package_list(&output.stdout))
    }

    #[instrument(skip(self, project), fields(project = %project.display()))]
    async fn add_package(&self, project: &Path, name: &str, version: &str) -> Result<()> {
        let args = vec![
            "add".to_string(),
            path_arg(project),
            "package".to_string(),
            name.to_string(),
            "--version".to_string(),
            version.to_string(),
        ];
        self.dotnet_checked(args, None, self.timeouts.upgrade).await?;
        info!("Updated {} to {}", name, version);
        Ok(())
    }

    #[instrument(skip(self, solution), fields(solution = %solution.display()))]
    async fn restore(&self, solution: &Path) -> Result<Vec<RestoreError>> {
        let args = vec!["restore".to_string(), path_arg(solution)];
        let output = self.dotnet(args, None, self.timeouts.restore).await?;

        let errors = parse_restore_output(&output.stderr, &output.stdout);
        if !output.success() && errors.is_empty() {
            return Err(NuplanError::process(
                format!("{} restore", self.executable),
                failure_message(&output),
            ));
        }
        Ok(errors)
    }

    async fn probe_dependencies(&self, name: &str, version: &str) -> Result<PackageListing> {
        // Removed on drop, whichever step fails
        let dir = tempfile::Builder::new().prefix("nuplan-probe-").tempdir()?;
        let project: PathBuf = dir.path().join("Probe.csproj");

        self.dotnet_checked(
            vec![
                "new".to_string(),
                "classlib".to_string(),
                "--name".to_string(),
                "Probe".to_string(),
                "--output".to_string(),
                path_arg(dir.path()),
                "--framework".to_string(),
                self.probe_framework.clone(),
            ],
            Some(dir.path()),
            self.timeouts.probe,
        )
        .await?;

        self.dotnet_checked(
            vec![
                "add".to_string(),
                path_arg(&project),
                "package".to_string(),
                name.to_string(),
                "--version".to_string(),
                version.to_string(),
            ],
            Some(dir.path()),
            self.timeouts.probe,
        )
        .await?;

        let output = self
            .dotnet_checked(
                vec![
                    "list".to_string(),
                    path_arg(&project),
                    "package".to_string(),
                    "--include-transitive".to_string(),
                ],
                Some(dir.path()),
                self.timeouts.probe,
            )
            .await?;

        let listing = parse_package_list(&output.stdout);
        debug!(
            "Probe of {} {} resolved {} transitive packages",
            name,
            version,
            listing.transitive.len()
        );
        Ok(listing)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted package manager for pipeline tests

    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct ScriptedPackageManager {
        /// Outdated packages keyed by target path
        pub outdated: BTreeMap<String, Vec<PackageUpdate>>,
        pub failing_targets: HashSet<String>,
        /// Listings keyed by project path
        pub listings: BTreeMap<String, PackageListing>,
        /// Probe results keyed by package name
        pub probes: BTreeMap<String, PackageListing>,
        /// Package names whose `add_package` fails
        pub failing_packages: HashSet<String>,
        pub restore_errors: Vec<RestoreError>,
        pub restore_fails: bool,
        /// Raise the flag once this many packages were added
        pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
        pub add_calls: Mutex<Vec<(String, String, String)>>,
        pub restore_calls: AtomicUsize,
    }

    impl ScriptedPackageManager {
        pub fn restore_count(&self) -> usize {
            self.restore_calls.load(Ordering::SeqCst)
        }

        pub fn added(&self) -> Vec<(String, String, String)> {
            self.add_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PackageManager for ScriptedPackageManager {
        async fn list_outdated(&self, target: &Path, _: bool) -> Result<Vec<PackageUpdate>> {
            let key = path_arg(target);
            if self.failing_targets.contains(&key) {
                return Err(NuplanError::process("dotnet list", "scripted failure"));
            }
            Ok(self.outdated.get(&key).cloned().unwrap_or_default())
        }

        async fn list_packages(&self, project: &Path, _: bool) -> Result<PackageListing> {
            let key = path_arg(project);
            if self.failing_targets.contains(&key) {
                return Err(NuplanError::process("dotnet list", "scripted failure"));
            }
            Ok(self.listings.get(&key).cloned().unwrap_or_default())
        }

        async fn add_package(&self, project: &Path, name: &str, version: &str) -> Result<()> {
            let count = {
                let mut calls = self.add_calls.lock().unwrap();
                calls.push((path_arg(project), name.to_string(), version.to_string()));
                calls.len()
            };
            if let Some((after, flag)) = &self.cancel_after
                && count >= *after
            {
                flag.store(true, Ordering::SeqCst);
            }
            if self.failing_packages.contains(name) {
                return Err(NuplanError::process("dotnet add", "scripted failure"));
            }
            Ok(())
        }

        async fn restore(&self, _: &Path) -> Result<Vec<RestoreError>> {
            self.restore_calls.fetch_add(1, Ordering::SeqCst);
            if self.restore_fails {
                return Err(NuplanError::timeout("dotnet restore", Duration::from_secs(120)));
            }
            Ok(self.restore_errors.clone())
        }

        async fn probe_dependencies(&self, name: &str, _: &str) -> Result<PackageListing> {
            self.probes
                .get(name)
                .cloned()
                .ok_or_else(|| NuplanError::process("dotnet new", "no probe scripted"))
        }
    }
}
