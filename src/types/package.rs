//! Package and dependency graph types
//!
//! `PackageUpdate` is what discovery produces; `PackageNode` and
//! `DependencyGraph` are the solution-wide view the analyzers work on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::conflict::VersionConflict;
use super::family::PackageFamily;

// =============================================================================
// PackageUpdate
// =============================================================================

/// One outdated dependency occurrence in one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageUpdate {
    pub package_name: String,
    pub current_version: String,
    pub recommended_version: String,
    pub project_path: String,
    #[serde(default)]
    pub has_breaking_changes: bool,
}

impl PackageUpdate {
    /// Create an update, flagging a major version bump as breaking
    pub fn new(
        package_name: impl Into<String>,
        current_version: impl Into<String>,
        recommended_version: impl Into<String>,
        project_path: impl Into<String>,
    ) -> Self {
        let current_version = current_version.into();
        let recommended_version = recommended_version.into();
        let has_breaking_changes = is_major_bump(&current_version, &recommended_version);
        Self {
            package_name: package_name.into(),
            current_version,
            recommended_version,
            project_path: project_path.into(),
            has_breaking_changes,
        }
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> String {
        format!(
            "{} {} -> {}",
            self.package_name, self.current_version, self.recommended_version
        )
    }
}

/// Leading numeric component of a NuGet version string
pub fn major_version(version: &str) -> Option<u64> {
    let digits: String = version
        .trim()
        .trim_start_matches(['v', 'V'])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// True when `to` has a greater major version than `from`
pub fn is_major_bump(from: &str, to: &str) -> bool {
    match (major_version(from), major_version(to)) {
        (Some(a), Some(b)) => b > a,
        _ => false,
    }
}

/// Numeric components of a version, ignoring prerelease/build suffixes.
///
/// NuGet allows four-part versions, so this is deliberately looser than semver.
pub fn version_components(version: &str) -> Vec<u64> {
    let core = version
        .trim()
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    core.split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Strict semantic version for a NuGet version string, when the conversion
/// loses nothing: `1.2` becomes `1.2.0` and `4.5.0.0` becomes `4.5.0`, while
/// `4.5.0.1` has no semver equivalent.
pub fn to_semver(version: &str) -> Option<semver::Version> {
    let version = version.trim();
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(parsed);
    }
    let split = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split);
    let parts: Vec<u64> = core
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<_>>()?;
    if parts.is_empty() || parts.len() > 4 || parts.get(3).is_some_and(|&rev| rev != 0) {
        return None;
    }
    let component = |i: usize| parts.get(i).copied().unwrap_or(0);
    semver::Version::parse(&format!(
        "{}.{}.{}{}",
        component(0),
        component(1),
        component(2),
        suffix
    ))
    .ok()
}

/// Compare two NuGet version strings by numeric components
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let left = version_components(a);
    let right = version_components(b);
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    // A prerelease sorts before its release
    match (a.contains('-'), b.contains('-')) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    }
}

// =============================================================================
// PackageNode
// =============================================================================

/// One package across the whole solution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageNode {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    /// Package dependencies: name -> version constraint
    pub direct_dependencies: BTreeMap<String, String>,
    /// Resolved dependency closure: name -> version
    pub transitive_dependencies: BTreeMap<String, String>,
    /// Packages in the solution that depend on this one
    pub dependents: Vec<String>,
    pub package_family: Option<String>,
    pub is_direct_reference: bool,
    pub projects: Vec<String>,
    /// Version seen in each project
    pub project_versions: BTreeMap<String, String>,
}

impl PackageNode {
    /// Create a node from its first sighting
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        project: impl Into<String>,
        is_direct: bool,
    ) -> Self {
        let version = version.into();
        let project = project.into();
        let mut project_versions = BTreeMap::new();
        project_versions.insert(project.clone(), version.clone());
        Self {
            name: name.into(),
            current_version: version.clone(),
            latest_version: version,
            direct_dependencies: BTreeMap::new(),
            transitive_dependencies: BTreeMap::new(),
            dependents: Vec::new(),
            package_family: None,
            is_direct_reference: is_direct,
            projects: vec![project],
            project_versions,
        }
    }

    /// Record another sighting of this package.
    ///
    /// `is_direct_reference` only ever flips to true. A direct reference's
    /// version wins over a transitive one seen earlier in the same project.
    pub fn record(&mut self, version: &str, project: &str, is_direct: bool) {
        if !self.projects.iter().any(|p| p == project) {
            self.projects.push(project.to_string());
        }
        match self.project_versions.get(project) {
            Some(_) if !is_direct => {}
            _ => {
                self.project_versions
                    .insert(project.to_string(), version.to_string());
            }
        }
        self.is_direct_reference |= is_direct;
    }

    /// Distinct versions recorded across projects
    pub fn distinct_versions(&self) -> BTreeSet<&str> {
        self.project_versions.values().map(String::as_str).collect()
    }

    /// Whether the package is outdated according to the latest known version
    pub fn is_outdated(&self) -> bool {
        compare_versions(&self.current_version, &self.latest_version).is_lt()
    }
}

// =============================================================================
// DependencyGraph
// =============================================================================

/// Solution-wide dependency graph, rebuilt for every analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub packages: BTreeMap<String, PackageNode>,
    /// Families in discovery order
    pub package_families: Vec<PackageFamily>,
    pub conflicts: Vec<VersionConflict>,
    pub critical_paths: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn has_families(&self) -> bool {
        !self.package_families.is_empty()
    }

    /// Copy latest versions from discovered updates onto the nodes
    pub fn apply_updates<'a>(&mut self, updates: impl IntoIterator<Item = &'a PackageUpdate>) {
        for update in updates {
            if let Some(node) = self.packages.get_mut(&update.package_name)
                && compare_versions(&node.latest_version, &update.recommended_version).is_lt()
            {
                node.latest_version = update.recommended_version.clone();
            }
        }
    }

    /// Number of packages referenced directly by at least one project
    pub fn direct_count(&self) -> usize {
        self.packages
            .values()
            .filter(|n| n.is_direct_reference)
            .count()
    }
}
