//! Dependency-based family detection: packages built on the same root form
//! its ecosystem.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::FamiliesConfig;
use crate::constants::families::{DEPENDENT_SATURATION, WELL_KNOWN_ROOT_BONUS};
use crate::types::{
    DetectionMethod, FamilyCharacteristics, FamilyUpdateStrategy, PackageFamily, PackageNode,
};

pub(super) fn detect(
    packages: &BTreeMap<String, PackageNode>,
    config: &FamiliesConfig,
) -> Vec<PackageFamily> {
    // Registry ids may differ in case from the project references
    let canonical: BTreeMap<String, &str> = packages
        .keys()
        .map(|name| (name.to_lowercase(), name.as_str()))
        .collect();

    let mut dependents: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for (name, node) in packages {
        for dependency in node.direct_dependencies.keys() {
            let root = canonical
                .get(&dependency.to_lowercase())
                .map(|s| s.to_string())
                .unwrap_or_else(|| dependency.clone());
            if root != *name {
                dependents.entry(root).or_default().insert(name.as_str());
            }
        }
    }

    dependents
        .into_iter()
        .filter(|(_, users)| users.len() >= config.min_family_size)
        .map(|(root, users)| {
            let mut confidence = (users.len() as f32 / DEPENDENT_SATURATION).min(1.0);
            if is_well_known(&root, &config.well_known_roots) {
                confidence += WELL_KNOWN_ROOT_BONUS;
            }

            let mut members: Vec<String> = users.iter().map(|s| s.to_string()).collect();
            if packages.contains_key(&root) {
                members.push(root.clone());
            }

            PackageFamily::new(
                format!("{} Ecosystem", root),
                members,
                DetectionMethod::Dependency,
                confidence.min(1.0),
            )
            .with_update_strategy(FamilyUpdateStrategy::Sequential)
            .with_characteristics(FamilyCharacteristics {
                shared_dependencies: Some(vec![root]),
                ..Default::default()
            })
        })
        .collect()
}

fn is_well_known(root: &str, roots: &[String]) -> bool {
    roots.iter().any(|r| r.eq_ignore_ascii_case(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, deps: &[&str]) -> (String, PackageNode) {
        let mut node = PackageNode::new(name, "1.0.0", "App.csproj", true);
        node.direct_dependencies = deps
            .iter()
            .map(|d| (d.to_string(), "[1.0.0, )".to_string()))
            .collect();
        (name.to_string(), node)
    }

    #[test]
    fn test_root_with_dependents_becomes_ecosystem() {
        let packages: BTreeMap<_, _> = [
            node("Serilog", &[]),
            node("Serilog.Sinks.Console", &["serilog"]),
            node("Serilog.Sinks.File", &["Serilog"]),
            node("Polly", &[]),
        ]
        .into_iter()
        .collect();

        let families = detect(&packages, &FamiliesConfig::default());
        assert_eq!(families.len(), 1);
        let family = &families[0];
        assert_eq!(family.name, "Serilog Ecosystem");
        assert_eq!(family.packages.len(), 3);
        assert!(family.contains("Serilog"));
        assert!((family.confidence - 0.4).abs() < 1e-6);
        assert_eq!(family.update_strategy, FamilyUpdateStrategy::Sequential);
    }

    #[test]
    fn test_well_known_root_bonus_and_absent_root() {
        let packages: BTreeMap<_, _> = [
            node("A", &["Newtonsoft.Json"]),
            node("B", &["Newtonsoft.Json"]),
            node("C", &["Newtonsoft.Json"]),
            node("D", &["Newtonsoft.Json"]),
            node("E", &["Newtonsoft.Json"]),
        ]
        .into_iter()
        .collect();

        let families = detect(&packages, &FamiliesConfig::default());
        assert_eq!(families[0].confidence, 1.0);
        assert_eq!(families[0].len(), 5);
        assert!(!families[0].contains("Newtonsoft.Json"));
    }

    #[test]
    fn test_single_dependent_ignored() {
        let packages: BTreeMap<_, _> = [node("A", &["Root"]), node("Root", &[])]
            .into_iter()
            .collect();
        assert!(detect(&packages, &FamiliesConfig::default()).is_empty());
    }
}
