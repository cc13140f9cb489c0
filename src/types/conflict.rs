//! Version conflict types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{NuplanError, Result, ValidationError, ValidationErrorKind};
use super::package::{compare_versions, to_semver, version_components};

/// How far apart the conflicting versions are
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Minor,
    Major,
    Critical,
}

impl ConflictSeverity {
    /// Severity from the largest component difference among versions:
    /// differing majors are critical, differing minors major, anything else minor.
    pub fn from_versions<'a>(versions: impl IntoIterator<Item = &'a str>) -> Self {
        let parsed: Vec<Vec<u64>> = versions.into_iter().map(version_components).collect();
        let component = |v: &Vec<u64>, i: usize| v.get(i).copied().unwrap_or(0);
        let differs = |i: usize| {
            parsed
                .windows(2)
                .any(|pair| component(&pair[0], i) != component(&pair[1], i))
        };
        if differs(0) {
            Self::Critical
        } else if differs(1) {
            Self::Major
        } else {
            Self::Minor
        }
    }
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One version participating in a conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingVersion {
    pub version: String,
    pub required_by: Vec<String>,
    pub constraint: String,
}

/// A package referenced with different versions across projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConflict {
    pub package_name: String,
    pub conflicting_versions: Vec<ConflictingVersion>,
    pub severity: ConflictSeverity,
    pub affected_projects: Vec<String>,
}

impl VersionConflict {
    /// Build from a project -> version map. Returns `None` when all versions agree.
    pub fn from_project_versions(
        package_name: &str,
        project_versions: &BTreeMap<String, String>,
    ) -> Option<Self> {
        let mut by_version: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (project, version) in project_versions {
            by_version
                .entry(version.as_str())
                .or_default()
                .push(project.clone());
        }
        if by_version.len() < 2 {
            return None;
        }

        let mut conflicting_versions: Vec<ConflictingVersion> = by_version
            .into_iter()
            .map(|(version, required_by)| ConflictingVersion {
                version: version.to_string(),
                required_by,
                constraint: format!("[{}]", version),
            })
            .collect();
        conflicting_versions.sort_by(|a, b| compare_versions(&a.version, &b.version));

        let severity = ConflictSeverity::from_versions(
            conflicting_versions.iter().map(|v| v.version.as_str()),
        );

        Some(Self {
            package_name: package_name.to_string(),
            affected_projects: project_versions.keys().cloned().collect(),
            conflicting_versions,
            severity,
        })
    }

    /// Highest version among the conflicting ones
    pub fn highest_version(&self) -> Option<&str> {
        self.conflicting_versions
            .iter()
            .map(|v| v.version.as_str())
            .max_by(|a, b| compare_versions(a, b))
    }
}

/// A project's view of a conflicting package, as handed to the analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub path: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// Recommended resolution for a version conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConflictAnalysis {
    pub package_name: String,
    pub current_versions: Vec<String>,
    pub recommended_version: String,
    pub reasoning: String,
    #[serde(default)]
    pub migration_steps: Vec<String>,
    #[serde(default)]
    pub breaking_changes: Vec<String>,
    #[serde(default)]
    pub compatibility_notes: Vec<String>,
    #[serde(default)]
    pub test_impact: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_graph: Option<Vec<ProjectVersion>>,
}

impl VersionConflictAnalysis {
    /// Deterministic "pick the highest version" resolution.
    ///
    /// The recommendation is the highest version in use that converts
    /// losslessly to `MAJOR.MINOR.PATCH`; when none does, this is a
    /// validation error. Callers use this when the oracle is unavailable;
    /// the analyzer never does.
    pub fn highest_version_fallback(package_name: &str, projects: &[ProjectVersion]) -> Result<Self> {
        let mut current_versions: Vec<String> =
            projects.iter().map(|p| p.version.clone()).collect();
        current_versions.sort_by(|a, b| compare_versions(a, b));
        current_versions.dedup();

        let Some(recommended) = current_versions.iter().rev().find_map(|v| to_semver(v)) else {
            return Err(NuplanError::Validation(
                ValidationError::new(
                    ValidationErrorKind::Format,
                    format!(
                        "no semantic version among the versions of {} in use: [{}]",
                        package_name,
                        current_versions.join(", ")
                    ),
                )
                .with_field("recommendedVersion"),
            ));
        };
        let recommended_version = recommended.to_string();
        let migration_steps = projects
            .iter()
            .filter(|p| to_semver(&p.version).as_ref() != Some(&recommended))
            .map(|p| {
                format!(
                    "Update {} in {} from {} to {}",
                    package_name, p.path, p.version, recommended_version
                )
            })
            .collect();

        Ok(Self {
            package_name: package_name.to_string(),
            current_versions,
            recommended_version,
            reasoning: "AI analysis unavailable; aligning every project on the highest version \
                        already in use"
                .to_string(),
            migration_steps,
            breaking_changes: Vec::new(),
            compatibility_notes: Vec::new(),
            test_impact: vec!["Run the full test suite of every affected project".to_string()],
            dependency_graph: Some(projects.to_vec()),
        })
    }
}
