//! Version conflict resolution
//!
//! Asks the oracle how to reconcile one package's versions across projects.
//! The recommendation must be a strict semantic version; anything else is a
//! validation error and never coerced.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::ai::Oracle;
use crate::config::{ConflictsConfig, KnownConstraint};
use crate::types::{
    NuplanError, ProjectVersion, Result, ValidationError, ValidationErrorKind,
    VersionConflictAnalysis, compare_versions,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OracleResolution {
    recommended_version: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    migration_steps: Vec<String>,
    #[serde(default)]
    breaking_changes: Vec<String>,
    #[serde(default)]
    compatibility_notes: Vec<String>,
    #[serde(default)]
    test_impact: Vec<String>,
}

fn schema() -> Value {
    let list = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "properties": {
            "recommendedVersion": {"type": "string"},
            "reasoning": {"type": "string"},
            "migrationSteps": list,
            "breakingChanges": list,
            "compatibilityNotes": list,
            "testImpact": list
        },
        "required": ["recommendedVersion", "reasoning"]
    })
}

fn build_prompt(package_name: &str, projects: &[ProjectVersion]) -> String {
    let mut prompt = format!(
        "The NuGet package {} is referenced at different versions across one .NET solution.\n\n",
        package_name
    );
    for project in projects {
        prompt.push_str(&format!("Project {} uses {}", project.path, project.version));
        if project.dependencies.is_empty() {
            prompt.push('\n');
        } else {
            let deps: Vec<String> = project
                .dependencies
                .iter()
                .map(|(name, version)| format!("{} {}", name, version))
                .collect();
            prompt.push_str(&format!(" alongside {}\n", deps.join(", ")));
        }
    }
    prompt.push_str(
        "\nRecommend one exact version (MAJOR.MINOR.PATCH) every project should use. Explain \
the reasoning, list migration steps, breaking changes, compatibility notes, and what \
tests are affected.",
    );
    prompt
}

/// Parse a strict semantic version or fail with a validation error
pub fn validate_recommended_version(version: &str) -> Result<semver::Version> {
    semver::Version::parse(version).map_err(|e| {
        NuplanError::Validation(
            ValidationError::new(
                ValidationErrorKind::Format,
                format!("recommended version is not a semantic version: {}", e),
            )
            .with_field("recommendedVersion")
            .with_comparison("MAJOR.MINOR.PATCH", version),
        )
    })
}

pub struct VersionConflictAnalyzer {
    oracle: Oracle,
    known_constraints: Vec<KnownConstraint>,
}

impl VersionConflictAnalyzer {
    pub fn new(oracle: Oracle, config: &ConflictsConfig) -> Self {
        Self {
            oracle,
            known_constraints: config.known_constraints.clone(),
        }
    }

    /// Oracle-backed resolution. Fails when the oracle is unavailable or
    /// malformed; callers choose their own fallback.
    #[instrument(skip(self, project_versions), fields(projects = project_versions.len()))]
    pub async fn analyze_version_conflict(
        &self,
        package_name: &str,
        project_versions: &[ProjectVersion],
    ) -> Result<VersionConflictAnalysis> {
        let resolution: OracleResolution = self
            .oracle
            .ask_for(&build_prompt(package_name, project_versions), &schema())
            .await
            .into_result()?;

        let recommended = validate_recommended_version(&resolution.recommended_version)?;
        let recommended_version = recommended.to_string();
        info!("Oracle recommends {} {}", package_name, recommended_version);

        let mut current_versions: Vec<String> = project_versions
            .iter()
            .map(|p| p.version.clone())
            .collect();
        current_versions.sort_by(|a, b| compare_versions(a, b));
        current_versions.dedup();

        let compatibility_notes = self.annotate_constraints(
            package_name,
            project_versions,
            resolution.compatibility_notes,
        );

        let moves: Vec<String> = project_versions
            .iter()
            .map(|p| {
                if p.version == recommended_version {
                    format!("{}: already on {}", p.path, p.version)
                } else {
                    format!("{}: {} -> {}", p.path, p.version, recommended_version)
                }
            })
            .collect();
        let context = moves.join("; ");
        let mut migration_steps: Vec<String> = resolution
            .migration_steps
            .into_iter()
            .map(|step| format!("{} ({})", step, context))
            .collect();
        migration_steps.extend(moves);

        Ok(VersionConflictAnalysis {
            package_name: package_name.to_string(),
            current_versions,
            recommended_version,
            reasoning: resolution.reasoning,
            migration_steps,
            breaking_changes: resolution.breaking_changes,
            compatibility_notes,
            test_impact: resolution.test_impact,
            dependency_graph: Some(project_versions.to_vec()),
        })
    }

    /// Known-constraint notes for the package itself and for every
    /// dependency a conflicting project carries alongside it.
    fn annotate_constraints(
        &self,
        package_name: &str,
        project_versions: &[ProjectVersion],
        mut notes: Vec<String>,
    ) -> Vec<String> {
        let mut push = |note: String| {
            if !notes.contains(&note) {
                notes.push(note);
            }
        };

        for constraint in &self.known_constraints {
            if constraint.matches(package_name) {
                push(constraint.note.clone());
            }
            for project in project_versions {
                for (dependency, version) in &project.dependencies {
                    if dependency != package_name && constraint.matches(dependency) {
                        push(format!(
                            "{} uses {} {}: {}",
                            project.path, dependency, version, constraint.note
                        ));
                    }
                }
            }
        }
        notes
    }
}
