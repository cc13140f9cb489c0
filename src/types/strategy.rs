//! Upgrade strategy types

use serde::{Deserialize, Serialize};

use super::package::PackageUpdate;

/// Overall risk of running a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A named batch of updates executed together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePhase {
    pub name: String,
    pub description: String,
    pub package_updates: Vec<PackageUpdate>,
    pub order: u32,
    pub rationale: String,
}

/// An ordered plan of phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeStrategy {
    pub name: String,
    pub description: String,
    pub phases: Vec<UpgradePhase>,
    pub estimated_risk: RiskLevel,
    pub estimated_time: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_recommendation: Option<String>,
}

impl UpgradeStrategy {
    /// Phases in execution order
    pub fn ordered_phases(&self) -> Vec<&UpgradePhase> {
        let mut phases: Vec<&UpgradePhase> = self.phases.iter().collect();
        phases.sort_by_key(|p| p.order);
        phases
    }

    pub fn total_updates(&self) -> usize {
        self.phases.iter().map(|p| p.package_updates.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_updates() == 0
    }
}
