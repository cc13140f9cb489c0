//! Upgrade Executor
//!
//! Runs a strategy's phases in order, one `add package` at a time. A failed
//! update is recorded and execution moves on. Restore runs once at the end.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::constants::strategy::NO_UPDATES_NAME;
use crate::dotnet::SharedPackageManager;
use crate::types::{ExecutionReport, RestoreError, RunState, UpgradeResult, UpgradeStrategy};

pub struct UpgradeExecutor {
    package_manager: SharedPackageManager,
    solution_path: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl UpgradeExecutor {
    pub fn new(package_manager: SharedPackageManager, solution_path: impl Into<PathBuf>) -> Self {
        Self {
            package_manager,
            solution_path: solution_path.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    #[instrument(skip_all, fields(strategy = %strategy.name))]
    pub async fn execute(&self, strategy: &UpgradeStrategy) -> ExecutionReport {
        let total = strategy.total_updates();
        if total == 0 {
            info!("No updates to apply");
            let mut report = ExecutionReport::new(NO_UPDATES_NAME);
            report.finish(RunState::Done);
            return report;
        }

        let mut report = ExecutionReport::new(strategy.name.clone());
        let mut index = 0;

        'phases: for phase in strategy.ordered_phases() {
            info!(
                "Phase {}: {} ({} updates)",
                phase.order,
                phase.name,
                phase.package_updates.len()
            );
            for update in &phase.package_updates {
                if self.cancelled() {
                    warn!("Cancelled after {} of {} updates", index, total);
                    report.cancelled = true;
                    break 'phases;
                }
                index += 1;
                let state = RunState::Executing { index, total };
                debug!(%state, "{}", update.label());

                let outcome = self
                    .package_manager
                    .add_package(
                        Path::new(&update.project_path),
                        &update.package_name,
                        &update.recommended_version,
                    )
                    .await;
                let error = match outcome {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("{} failed: {}", update.label(), e);
                        Some(e.to_string())
                    }
                };
                report.results.push(UpgradeResult {
                    package_name: update.package_name.clone(),
                    project_path: update.project_path.clone(),
                    from_version: update.current_version.clone(),
                    to_version: update.recommended_version.clone(),
                    phase: phase.name.clone(),
                    success: error.is_none(),
                    error,
                });
            }
        }

        if !report.cancelled || report.succeeded() > 0 {
            info!(state = %RunState::Restoring, "Restoring {}", self.solution_path.display());
            report.restore_errors = match self.package_manager.restore(&self.solution_path).await {
                Ok(errors) => errors,
                Err(e) => {
                    warn!("Restore did not run: {}", e);
                    vec![RestoreError::restore_failed(e.to_string())]
                }
            };
            report.restored = true;
        }

        report.finish(RunState::Done);
        info!("{}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dotnet::cli::mock::ScriptedPackageManager;
    use crate::types::{PackageUpdate, RiskLevel, UpgradePhase};

    fn update(name: &str) -> PackageUpdate {
        PackageUpdate::new(name, "1.0.0", "2.0.0", "src/App/App.csproj")
    }

    fn strategy(phases: Vec<(u32, Vec<&str>)>) -> UpgradeStrategy {
        UpgradeStrategy {
            name: "Test".to_string(),
            description: String::new(),
            phases: phases
                .into_iter()
                .map(|(order, names)| UpgradePhase {
                    name: format!("Phase {}", order),
                    description: String::new(),
                    package_updates: names.into_iter().map(update).collect(),
                    order,
                    rationale: String::new(),
                })
                .collect(),
            estimated_risk: RiskLevel::Low,
            estimated_time: String::new(),
            pros: vec![],
            cons: vec![],
            ai_recommendation: None,
        }
    }

    #[tokio::test]
    async fn test_partial_failure_continues_and_restores_once() {
        let manager = Arc::new(ScriptedPackageManager {
            failing_packages: ["Polly".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let executor = UpgradeExecutor::new(manager.clone(), "All.sln");
        let report = executor
            .execute(&strategy(vec![(1, vec!["Serilog", "Polly", "Dapper"])]))
            .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.results[1].success);
        assert!(report.results[1].error.is_some());
        assert_eq!(manager.restore_count(), 1);
        assert_eq!(report.final_state, RunState::Done);
        assert_eq!(report.summary(), "2 succeeded, 1 failed, 0 restore errors");
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let manager = Arc::new(ScriptedPackageManager::default());
        let executor = UpgradeExecutor::new(manager.clone(), "All.sln");
        executor
            .execute(&strategy(vec![(3, vec!["C"]), (1, vec!["A"]), (2, vec!["B"])]))
            .await;
        let order: Vec<String> = manager.added().into_iter().map(|(_, name, _)| name).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(manager.added()[0].0, "src/App/App.csproj");
        assert_eq!(manager.added()[0].2, "2.0.0");
    }

    #[tokio::test]
    async fn test_no_updates_skips_restore() {
        let manager = Arc::new(ScriptedPackageManager::default());
        let executor = UpgradeExecutor::new(manager.clone(), "All.sln");
        let report = executor.execute(&strategy(vec![])).await;

        assert_eq!(report.strategy_name, NO_UPDATES_NAME);
        assert!(report.results.is_empty());
        assert!(!report.restored);
        assert_eq!(manager.restore_count(), 0);
        assert_eq!(report.final_state, RunState::Done);
    }

    #[tokio::test]
    async fn test_restore_failure_is_reported() {
        let manager = Arc::new(ScriptedPackageManager {
            restore_fails: true,
            ..Default::default()
        });
        let report = UpgradeExecutor::new(manager, "All.sln")
            .execute(&strategy(vec![(1, vec!["Serilog"])]))
            .await;
        assert_eq!(report.restore_errors.len(), 1);
        assert_eq!(report.restore_errors[0].code, RestoreError::RESTORE_FAILED);
    }

    #[tokio::test]
    async fn test_cancellation_stops_and_still_restores() {
        let flag = Arc::new(AtomicBool::new(false));
        let manager = Arc::new(ScriptedPackageManager {
            cancel_after: Some((2, flag.clone())),
            ..Default::default()
        });
        let executor = UpgradeExecutor::new(manager.clone(), "All.sln").with_cancel_flag(flag);
        let report = executor
            .execute(&strategy(vec![(1, vec!["A", "B"]), (2, vec!["C", "D"])]))
            .await;

        assert!(report.cancelled);
        assert_eq!(report.results.len(), 2);
        assert!(report.restored);
        assert_eq!(manager.restore_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_restore() {
        let manager = Arc::new(ScriptedPackageManager::default());
        let executor = UpgradeExecutor::new(manager.clone(), "All.sln");
        executor.cancel_flag().store(true, Ordering::SeqCst);
        let report = executor.execute(&strategy(vec![(1, vec!["A"])])).await;

        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(manager.restore_count(), 0);
    }
}
