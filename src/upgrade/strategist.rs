//! Upgrade Strategist
//!
//! Turns discovered updates into phased plans. Three deterministic plans are
//! always produced; an oracle-recommended ordering is available on request
//! and falls back to a fixed framework-first ordering.

use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::naming::format_family_name;
use crate::ai::{Oracle, OracleReply};
use crate::constants::strategy::{
    ALL_AT_ONCE_ESTIMATE, CONSERVATIVE_MINUTES_PER_PHASE, FAMILY_MINUTES_PER_PHASE,
    FRAMEWORK_PREFIXES,
};
use crate::types::{
    DependencyGraph, FamilyUpdateStrategy, PackageFamily, PackageUpdate, RiskLevel,
    UpdatesByProject, UpgradePhase, UpgradeStrategy, flatten_updates,
};

pub const FAMILY_FIRST: &str = "Family-First";
pub const CONSERVATIVE: &str = "Conservative";
pub const ALL_AT_ONCE: &str = "All-at-Once";
pub const AI_RECOMMENDED: &str = "AI Recommended";

fn estimate(phases: usize, (low, high): (usize, usize)) -> String {
    format!("{}-{} minutes", phases * low, phases * high)
}

fn phase(
    name: impl Into<String>,
    description: impl Into<String>,
    package_updates: Vec<PackageUpdate>,
    order: usize,
    rationale: impl Into<String>,
) -> UpgradePhase {
    UpgradePhase {
        name: name.into(),
        description: description.into(),
        package_updates,
        order: order as u32,
        rationale: rationale.into(),
    }
}

fn project_label(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
}

fn breaking_count(updates: &[PackageUpdate]) -> usize {
    updates.iter().filter(|u| u.has_breaking_changes).count()
}

fn family_rationale(family: &PackageFamily) -> String {
    let how = match family.update_strategy {
        FamilyUpdateStrategy::Together => "should move together to stay compatible",
        FamilyUpdateStrategy::Sequential => "share a root package that is upgraded first",
        FamilyUpdateStrategy::Independent => "are related but can be verified one by one",
    };
    format!(
        "Packages of the {} family {} (detected by {}, confidence {:.2})",
        family.name, how, family.detection_method, family.confidence
    )
}

#[derive(Debug, Deserialize)]
struct OraclePlan {
    phases: Vec<OraclePhase>,
    #[serde(default)]
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OraclePhase {
    name: String,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    rationale: String,
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "phases": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "packages": {"type": "array", "items": {"type": "string"}},
                        "rationale": {"type": "string"}
                    },
                    "required": ["name", "packages"]
                }
            },
            "recommendation": {"type": "string"}
        },
        "required": ["phases"]
    })
}

fn plan_prompt(solution_path: &Path, updates: &[PackageUpdate]) -> String {
    let mut names: Vec<String> = Vec::new();
    for update in updates {
        let line = format!(
            "- {} {} -> {}{}",
            update.package_name,
            update.current_version,
            update.recommended_version,
            if update.has_breaking_changes { " (major)" } else { "" }
        );
        if !names.contains(&line) {
            names.push(line);
        }
    }
    format!(
        "Plan the upgrade of the .NET solution {} in ordered phases. Put foundational \
packages (frameworks, shared abstractions) before the packages built on them and keep \
packages that must move together in the same phase. Use only the package names below, \
and give every phase a name and a one-sentence rationale. End with a short overall \
recommendation.\n\nUpdates:\n{}",
        solution_path.display(),
        names.join("\n")
    )
}

/// Microsoft/System packages first, then alphabetical
fn is_framework(update: &PackageUpdate) -> bool {
    FRAMEWORK_PREFIXES
        .iter()
        .any(|prefix| update.package_name.starts_with(prefix))
}

pub struct UpgradeStrategist {
    oracle: Oracle,
}

impl UpgradeStrategist {
    pub fn new(oracle: Oracle) -> Self {
        Self { oracle }
    }

    /// Family-First, Conservative and All-at-Once, in that order
    #[instrument(skip_all, fields(solution = %solution_path.display()))]
    pub fn generate_upgrade_strategies(
        &self,
        solution_path: &Path,
        updates: &UpdatesByProject,
        graph: Option<&DependencyGraph>,
    ) -> Vec<UpgradeStrategy> {
        let all = flatten_updates(updates);
        info!(
            "Planning {} updates across {} projects",
            all.len(),
            updates.len()
        );
        vec![
            family_first(&all, graph),
            conservative(&all),
            all_at_once(&all),
        ]
    }

    /// Oracle-ordered plan; same shape as the fallback when the oracle fails
    #[instrument(skip_all, fields(solution = %solution_path.display()))]
    pub async fn recommend_strategy(
        &self,
        solution_path: &Path,
        updates: &UpdatesByProject,
    ) -> UpgradeStrategy {
        let all = flatten_updates(updates);
        if all.is_empty() || !self.oracle.is_enabled() {
            return fallback_strategy(&all, "oracle disabled");
        }

        let reply = self
            .oracle
            .ask_for::<OraclePlan>(&plan_prompt(solution_path, &all), &plan_schema())
            .await;
        match reply {
            OracleReply::Ok(plan) => oracle_strategy(&all, plan),
            OracleReply::Malformed(reason) | OracleReply::Unavailable(reason) => {
                warn!("Falling back to deterministic ordering: {}", reason);
                fallback_strategy(&all, &reason)
            }
        }
    }
}

// =============================================================================
// Deterministic strategies
// =============================================================================

fn family_first(updates: &[PackageUpdate], graph: Option<&DependencyGraph>) -> UpgradeStrategy {
    let families: &[PackageFamily] = graph
        .map(|g| g.package_families.as_slice())
        .unwrap_or_default();

    let mut phases = Vec::new();
    if families.is_empty() {
        if !updates.is_empty() {
            phases.push(phase(
                "Update All",
                format!("Update all {} packages", updates.len()),
                updates.to_vec(),
                1,
                "No package families were detected",
            ));
        }
    } else {
        let mut grouped: Vec<Vec<PackageUpdate>> = vec![Vec::new(); families.len()];
        let mut unmatched = Vec::new();
        for update in updates {
            match families.iter().position(|f| f.contains(&update.package_name)) {
                Some(index) => grouped[index].push(update.clone()),
                None => unmatched.push(update.clone()),
            }
        }

        for (family, members) in families.iter().zip(grouped) {
            if members.is_empty() {
                continue;
            }
            let name = format_family_name(&family.name);
            debug!("Phase '{}' with {} updates", name, members.len());
            phases.push(phase(
                name,
                format!("Update {} packages of the {} family", members.len(), family.name),
                members,
                phases.len() + 1,
                family_rationale(family),
            ));
        }
        if !unmatched.is_empty() {
            phases.push(phase(
                "Remaining Packages",
                format!("Update {} packages outside any family", unmatched.len()),
                unmatched,
                phases.len() + 1,
                "Packages without a detected family are upgraded last",
            ));
        }
    }

    let mut cons = vec!["More phases than an all-at-once upgrade".to_string()];
    if breaking_count(updates) > 0 {
        cons.push(format!(
            "{} updates change the major version",
            breaking_count(updates)
        ));
    }

    UpgradeStrategy {
        name: FAMILY_FIRST.to_string(),
        description: "Upgrade related packages together, one family per phase".to_string(),
        estimated_time: estimate(phases.len(), FAMILY_MINUTES_PER_PHASE),
        phases,
        estimated_risk: RiskLevel::Medium,
        pros: vec![
            "Keeps related packages on compatible versions".to_string(),
            "Failures are isolated to one family".to_string(),
        ],
        cons,
        ai_recommendation: None,
    }
}

fn conservative(updates: &[PackageUpdate]) -> UpgradeStrategy {
    let phases: Vec<UpgradePhase> = updates
        .iter()
        .enumerate()
        .map(|(i, update)| {
            phase(
                format!(
                    "Update {} in {}",
                    update.package_name,
                    project_label(&update.project_path)
                ),
                update.label(),
                vec![update.clone()],
                i + 1,
                "One package at a time minimizes risk and allows rollback",
            )
        })
        .collect();

    UpgradeStrategy {
        name: CONSERVATIVE.to_string(),
        description: "Upgrade one package per phase".to_string(),
        estimated_time: estimate(phases.len(), CONSERVATIVE_MINUTES_PER_PHASE),
        phases,
        estimated_risk: RiskLevel::Low,
        pros: vec![
            "Every failure points at a single package".to_string(),
            "Easy to stop and roll back".to_string(),
        ],
        cons: vec![
            "Slowest strategy".to_string(),
            "Intermediate states may mix old and new family members".to_string(),
        ],
        ai_recommendation: None,
    }
}

fn all_at_once(updates: &[PackageUpdate]) -> UpgradeStrategy {
    let phases = if updates.is_empty() {
        Vec::new()
    } else {
        vec![phase(
            "Update All Packages",
            format!("Update all {} packages in one pass", updates.len()),
            updates.to_vec(),
            1,
            "Fastest path when the solution has good test coverage",
        )]
    };

    UpgradeStrategy {
        name: ALL_AT_ONCE.to_string(),
        description: "Upgrade every package in a single phase".to_string(),
        phases,
        estimated_risk: RiskLevel::High,
        estimated_time: ALL_AT_ONCE_ESTIMATE.to_string(),
        pros: vec!["Fastest strategy".to_string()],
        cons: vec![
            "Hard to tell which update broke the build".to_string(),
            "Rollback means reverting everything".to_string(),
        ],
        ai_recommendation: None,
    }
}

// =============================================================================
// Oracle strategy
// =============================================================================

fn ai_strategy(phases: Vec<UpgradePhase>, recommendation: String) -> UpgradeStrategy {
    UpgradeStrategy {
        name: AI_RECOMMENDED.to_string(),
        description: "Phases ordered by recommended upgrade sequence".to_string(),
        estimated_time: estimate(phases.len(), FAMILY_MINUTES_PER_PHASE),
        phases,
        estimated_risk: RiskLevel::Medium,
        pros: vec!["Ordering accounts for package relationships".to_string()],
        cons: vec!["Ordering is advisory and not verified".to_string()],
        ai_recommendation: Some(recommendation),
    }
}

fn oracle_strategy(updates: &[PackageUpdate], plan: OraclePlan) -> UpgradeStrategy {
    let mut assigned = vec![false; updates.len()];
    let mut phases = Vec::new();

    for proposed in plan.phases {
        let wanted: BTreeSet<String> = proposed.packages.iter().map(|p| p.to_lowercase()).collect();
        let mut members = Vec::new();
        for (update, taken) in updates.iter().zip(assigned.iter_mut()) {
            if !*taken && wanted.contains(&update.package_name.to_lowercase()) {
                *taken = true;
                members.push(update.clone());
            }
        }
        if members.is_empty() {
            debug!("Ignoring phase '{}': no known packages", proposed.name);
            continue;
        }
        let rationale = if proposed.rationale.is_empty() {
            "Recommended ordering".to_string()
        } else {
            proposed.rationale
        };
        phases.push(phase(
            proposed.name,
            format!("Update {} packages", members.len()),
            members,
            phases.len() + 1,
            rationale,
        ));
    }

    let omitted: Vec<PackageUpdate> = updates
        .iter()
        .zip(&assigned)
        .filter(|(_, done)| !**done)
        .map(|(u, _)| u.clone())
        .collect();
    if !omitted.is_empty() {
        debug!("{} updates were not placed by the oracle", omitted.len());
        phases.push(phase(
            "Remaining Packages",
            format!("Update {} packages not placed in earlier phases", omitted.len()),
            omitted,
            phases.len() + 1,
            "Packages the recommendation did not mention",
        ));
    }

    let recommendation = plan
        .recommendation
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Follow the phases in order".to_string());
    ai_strategy(phases, recommendation)
}

fn fallback_strategy(updates: &[PackageUpdate], reason: &str) -> UpgradeStrategy {
    let mut sorted = updates.to_vec();
    sorted.sort_by(|a, b| {
        a.package_name
            .to_lowercase()
            .cmp(&b.package_name.to_lowercase())
            .then_with(|| a.project_path.cmp(&b.project_path))
    });
    let (framework, other): (Vec<_>, Vec<_>) = sorted.into_iter().partition(is_framework);

    let mut phases = Vec::new();
    if !framework.is_empty() {
        phases.push(phase(
            "Framework Packages",
            format!("Update {} Microsoft and System packages", framework.len()),
            framework,
            phases.len() + 1,
            "Framework packages are the base other packages build on",
        ));
    }
    if !other.is_empty() {
        phases.push(phase(
            "Other Packages",
            format!("Update {} remaining packages", other.len()),
            other,
            phases.len() + 1,
            "Remaining packages in alphabetical order",
        ));
    }

    ai_strategy(
        phases,
        format!("Deterministic framework-first ordering ({})", reason),
    )
}
