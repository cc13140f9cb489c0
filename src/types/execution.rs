//! Execution results and run state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RunId;
use super::restore::RestoreError;

/// Outcome of a single `add package`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeResult {
    pub package_name: String,
    pub project_path: String,
    pub from_version: String,
    pub to_version: String,
    pub phase: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RunState {
    Discovering,
    StrategyGenerated,
    Executing { index: usize, total: usize },
    Restoring,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovering => write!(f, "discovering"),
            Self::StrategyGenerated => write!(f, "strategy generated"),
            Self::Executing { index, total } => write!(f, "executing {} of {}", index, total),
            Self::Restoring => write!(f, "restoring"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything one `upgrade` run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub run_id: RunId,
    pub strategy_name: String,
    pub results: Vec<UpgradeResult>,
    pub restore_errors: Vec<RestoreError>,
    pub final_state: RunState,
    pub cancelled: bool,
    pub restored: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionReport {
    pub fn new(strategy_name: impl Into<String>) -> Self {
        Self {
            run_id: RunId::generate(),
            strategy_name: strategy_name.into(),
            results: Vec::new(),
            restore_errors: Vec::new(),
            final_state: RunState::StrategyGenerated,
            cancelled: false,
            restored: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} restore errors",
            self.succeeded(),
            self.failed(),
            self.restore_errors.len()
        )
    }

    pub fn finish(&mut self, state: RunState) {
        self.final_state = state;
        self.finished_at = Some(Utc::now());
    }
}
