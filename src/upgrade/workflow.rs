//! Upgrade Workflow
//!
//! Discovery -> graph -> strategy -> execution, with each stage degrading
//! independently. Only a missing solution fails the run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{info, instrument, warn};

use super::executor::UpgradeExecutor;
use super::strategist::{ALL_AT_ONCE, CONSERVATIVE, FAMILY_FIRST, UpgradeStrategist};
use crate::ai::Oracle;
use crate::analysis::{DependencyGraphBuilder, VersionConflictAnalyzer};
use crate::config::{Config, StrategyChoice};
use crate::dotnet::{SharedPackageManager, solution_projects};
use crate::types::{
    DependencyGraph, ExecutionReport, ProjectVersion, RestoreErrorCategory, Result, RunState,
    UpdatesByProject, UpgradeStrategy, VersionConflict, VersionConflictAnalysis,
    flatten_updates,
};

/// Everything `plan` decided, before anything is changed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlan {
    pub solution_path: PathBuf,
    pub updates: UpdatesByProject,
    pub graph: Option<DependencyGraph>,
    pub strategies: Vec<UpgradeStrategy>,
    pub selected: UpgradeStrategy,
}

impl UpgradePlan {
    pub fn total_updates(&self) -> usize {
        self.updates.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutcome {
    pub plan: UpgradePlan,
    pub report: Option<ExecutionReport>,
    /// Explanations for version conflicts the restore reported
    pub conflict_analyses: Vec<VersionConflictAnalysis>,
    /// Why the restore conflicts could not be explained; the report stands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_error: Option<String>,
}

pub struct UpgradeWorkflow {
    config: Config,
    package_manager: SharedPackageManager,
    oracle: Oracle,
    cancel: Arc<AtomicBool>,
}

impl UpgradeWorkflow {
    pub fn new(config: Config, package_manager: SharedPackageManager, oracle: Oracle) -> Self {
        Self {
            config,
            package_manager,
            oracle,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Outdated packages per project. A failed scan counts as zero updates.
    #[instrument(skip(self), fields(solution = %solution_path.display()))]
    pub async fn discover(&self, solution_path: &Path) -> Result<UpdatesByProject> {
        info!(state = %RunState::Discovering, "Scanning for outdated packages");
        let projects = solution_projects(solution_path)?;

        let mut updates = UpdatesByProject::new();
        for project in &projects {
            let found = match self.package_manager.list_outdated(&project.path, false).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Outdated scan failed for {}: {}", project.name, e);
                    continue;
                }
            };
            let found = if self.config.upgrade.allow_breaking_changes {
                found
            } else {
                let (kept, breaking): (Vec<_>, Vec<_>) =
                    found.into_iter().partition(|u| !u.has_breaking_changes);
                for update in &breaking {
                    info!("Skipping major upgrade {}", update.label());
                }
                kept
            };
            if !found.is_empty() {
                updates.insert(project.path.to_string_lossy().into_owned(), found);
            }
        }

        info!(
            "{} outdated packages in {} of {} projects",
            flatten_updates(&updates).len(),
            updates.len(),
            projects.len()
        );
        Ok(updates)
    }

    /// Dependency graph, or `None` when it could not be built
    pub async fn build_graph(&self, solution_path: &Path) -> Option<DependencyGraph> {
        let builder = match DependencyGraphBuilder::new(
            Arc::clone(&self.package_manager),
            &self.config,
            self.oracle.clone(),
        ) {
            Ok(builder) => builder,
            Err(e) => {
                warn!("Dependency graph unavailable: {}", e);
                return None;
            }
        };
        match builder.analyze_solution_dependencies(solution_path).await {
            Ok(graph) => Some(graph),
            Err(e) => {
                warn!("Dependency analysis failed: {}; planning without families", e);
                None
            }
        }
    }

    #[instrument(skip(self), fields(solution = %solution_path.display()))]
    pub async fn plan(&self, solution_path: &Path, choice: StrategyChoice) -> Result<UpgradePlan> {
        let updates = match self.discover(solution_path).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(state = %RunState::Failed, "Discovery failed: {}", e);
                return Err(e);
            }
        };

        let mut graph = self.build_graph(solution_path).await;
        if let Some(graph) = graph.as_mut() {
            graph.apply_updates(flatten_updates(&updates).iter());
        }

        let strategist = UpgradeStrategist::new(self.oracle.clone());
        let strategies =
            strategist.generate_upgrade_strategies(solution_path, &updates, graph.as_ref());
        let selected = match choice {
            StrategyChoice::Ai => strategist.recommend_strategy(solution_path, &updates).await,
            other => select(&strategies, other),
        };
        info!(
            state = %RunState::StrategyGenerated,
            "Selected {} ({} phases)",
            selected.name,
            selected.phases.len()
        );

        Ok(UpgradePlan {
            solution_path: solution_path.to_path_buf(),
            updates,
            graph,
            strategies,
            selected,
        })
    }

    /// Plan, then execute unless `dry_run`
    pub async fn run(
        &self,
        solution_path: &Path,
        choice: StrategyChoice,
        dry_run: bool,
    ) -> Result<WorkflowOutcome> {
        let plan = self.plan(solution_path, choice).await?;
        if dry_run {
            info!("Dry run: nothing executed");
            return Ok(WorkflowOutcome {
                plan,
                report: None,
                conflict_analyses: Vec::new(),
                conflict_error: None,
            });
        }

        let executor = UpgradeExecutor::new(Arc::clone(&self.package_manager), solution_path)
            .with_cancel_flag(Arc::clone(&self.cancel));
        let report = executor.execute(&plan.selected).await;

        let explained = match &plan.graph {
            Some(graph) => self.explain_restore_conflicts(graph, &report).await,
            None => Ok(Vec::new()),
        };
        let (conflict_analyses, conflict_error) = match explained {
            Ok(analyses) => (analyses, None),
            Err(e) => {
                warn!("Restore conflicts left unexplained: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        Ok(WorkflowOutcome {
            plan,
            report: Some(report),
            conflict_analyses,
            conflict_error,
        })
    }

    /// Resolve every version conflict in the solution
    #[instrument(skip(self), fields(solution = %solution_path.display()))]
    pub async fn analyze_conflicts(
        &self,
        solution_path: &Path,
    ) -> Result<(DependencyGraph, Vec<VersionConflictAnalysis>)> {
        let builder = DependencyGraphBuilder::new(
            Arc::clone(&self.package_manager),
            &self.config,
            self.oracle.clone(),
        )?;
        let graph = builder.analyze_solution_dependencies(solution_path).await?;
        let analyses = self.resolve_conflicts(&graph, graph.conflicts.iter()).await?;
        Ok((graph, analyses))
    }

    async fn explain_restore_conflicts(
        &self,
        graph: &DependencyGraph,
        report: &ExecutionReport,
    ) -> Result<Vec<VersionConflictAnalysis>> {
        let messages: Vec<&str> = report
            .restore_errors
            .iter()
            .filter(|e| e.category() == RestoreErrorCategory::VersionConflict)
            .map(|e| e.full_text.as_str())
            .collect();
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let mentioned = graph
            .conflicts
            .iter()
            .filter(|c| messages.iter().any(|m| m.contains(&c.package_name)));
        self.resolve_conflicts(graph, mentioned).await
    }

    /// Oracle resolution per conflict; the highest-version fallback covers an
    /// unavailable or malformed oracle. Validation failures propagate.
    async fn resolve_conflicts<'a>(
        &self,
        graph: &DependencyGraph,
        conflicts: impl Iterator<Item = &'a VersionConflict>,
    ) -> Result<Vec<VersionConflictAnalysis>> {
        let analyzer = VersionConflictAnalyzer::new(self.oracle.clone(), &self.config.conflicts);
        let mut analyses = Vec::new();
        for conflict in conflicts {
            let projects = project_versions(graph, conflict);
            let analysis = match analyzer
                .analyze_version_conflict(&conflict.package_name, &projects)
                .await
            {
                Ok(analysis) => analysis,
                Err(e) if e.is_validation() => return Err(e),
                Err(e) => {
                    warn!(
                        "Using highest version for {}: {}",
                        conflict.package_name, e
                    );
                    VersionConflictAnalysis::highest_version_fallback(
                        &conflict.package_name,
                        &projects,
                    )?
                }
            };
            analyses.push(analysis);
        }
        Ok(analyses)
    }
}

fn select(strategies: &[UpgradeStrategy], choice: StrategyChoice) -> UpgradeStrategy {
    let name = match choice {
        StrategyChoice::Conservative => CONSERVATIVE,
        StrategyChoice::AllAtOnce => ALL_AT_ONCE,
        StrategyChoice::FamilyFirst | StrategyChoice::Ai => FAMILY_FIRST,
    };
    strategies
        .iter()
        .find(|s| s.name == name)
        .or_else(|| strategies.first())
        .cloned()
        .unwrap_or_else(|| UpgradeStrategy {
            name: name.to_string(),
            description: String::new(),
            phases: Vec::new(),
            estimated_risk: crate::types::RiskLevel::Low,
            estimated_time: String::new(),
            pros: Vec::new(),
            cons: Vec::new(),
            ai_recommendation: None,
        })
}

/// Each affected project's version of the conflicted package plus every
/// other package recorded for that project.
fn project_versions(graph: &DependencyGraph, conflict: &VersionConflict) -> Vec<ProjectVersion> {
    let Some(node) = graph.packages.get(&conflict.package_name) else {
        return Vec::new();
    };

    node.project_versions
        .iter()
        .map(|(project, version)| {
            let dependencies: BTreeMap<String, String> = graph
                .packages
                .values()
                .filter(|other| other.name != node.name)
                .filter_map(|other| {
                    other
                        .project_versions
                        .get(project)
                        .map(|v| (other.name.clone(), v.clone()))
                })
                .collect();
            ProjectVersion {
                path: project.clone(),
                version: version.clone(),
                dependencies,
            }
        })
        .collect()
}
