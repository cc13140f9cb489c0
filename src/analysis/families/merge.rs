//! Candidate merging and manual overrides
//!
//! Both stages take a snapshot and return a new one.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::constants::families::MERGE_OVERLAP_THRESHOLD;
use crate::types::{DetectionMethod, FamilyUpdateStrategy, PackageFamily, jaccard};

/// Fold each candidate into the first family it overlaps by more than the
/// merge threshold; otherwise it starts a new family.
pub(super) fn merge_families(candidates: Vec<PackageFamily>) -> Vec<PackageFamily> {
    let mut merged: Vec<PackageFamily> = Vec::new();
    // Confidence of every constituent, parallel to `merged`
    let mut constituents: Vec<Vec<f32>> = Vec::new();

    for candidate in candidates {
        let target = merged
            .iter()
            .position(|existing| jaccard(existing, &candidate) > MERGE_OVERLAP_THRESHOLD);

        let Some(index) = target else {
            constituents.push(vec![candidate.confidence]);
            merged.push(candidate);
            continue;
        };

        let family = &mut merged[index];
        debug!(
            "Merging {} family '{}' into '{}'",
            candidate.detection_method, candidate.name, family.name
        );

        let members: BTreeSet<String> = family
            .packages
            .drain(..)
            .chain(candidate.packages.iter().cloned())
            .collect();
        family.packages = members.into_iter().collect();

        let scores = &mut constituents[index];
        scores.push(candidate.confidence);
        family.confidence = scores.iter().sum::<f32>() / scores.len() as f32;

        let mut methods = family.methods();
        for method in candidate.methods() {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        family.characteristics.detection_methods = Some(methods);

        let ours = &mut family.characteristics;
        let theirs = candidate.characteristics;
        ours.common_prefix = ours.common_prefix.take().or(theirs.common_prefix);
        ours.common_suffix = ours.common_suffix.take().or(theirs.common_suffix);
        ours.shared_dependencies = ours.shared_dependencies.take().or(theirs.shared_dependencies);
        ours.author = ours.author.take().or(theirs.author);
        ours.tags = ours.tags.take().or(theirs.tags);
        ours.reasoning = ours.reasoning.take().or(theirs.reasoning);
    }

    merged
}

fn is_manual(family: &PackageFamily) -> bool {
    family.methods().contains(&DetectionMethod::Manual)
}

/// Apply `package -> family name` overrides.
///
/// An overridden package leaves every other family and joins the named one,
/// which is created at full confidence when missing. Afterwards empty
/// families, and automatic families that shrank below `min_size`, are dropped.
pub(super) fn apply_manual_overrides(
    mut families: Vec<PackageFamily>,
    overrides: &BTreeMap<String, String>,
    known: &BTreeSet<&str>,
    min_size: usize,
) -> Vec<PackageFamily> {
    if overrides.is_empty() {
        return families;
    }

    for (package, family_name) in overrides {
        if !known.contains(package.as_str()) {
            debug!("Ignoring override for {}: not in solution", package);
            continue;
        }

        for family in families.iter_mut().filter(|f| f.name != *family_name) {
            family.packages.retain(|p| p != package);
        }

        match families.iter_mut().find(|f| f.name == *family_name) {
            Some(family) => {
                if !family.contains(package) {
                    family.packages.push(package.clone());
                    family.packages.sort();
                }
                let mut methods = family.methods();
                if !methods.contains(&DetectionMethod::Manual) {
                    methods.push(DetectionMethod::Manual);
                }
                family.characteristics.detection_methods = Some(methods);
            }
            None => families.push(
                PackageFamily::new(
                    family_name.clone(),
                    [package.clone()],
                    DetectionMethod::Manual,
                    1.0,
                )
                .with_update_strategy(FamilyUpdateStrategy::Together),
            ),
        }
    }

    families.retain(|f| !f.is_empty() && (is_manual(f) || f.len() >= min_size));
    families
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(name: &str, members: &[&str], method: DetectionMethod, confidence: f32) -> PackageFamily {
        PackageFamily::new(
            name,
            members.iter().map(|s| s.to_string()),
            method,
            confidence,
        )
    }

    #[test]
    fn test_merge_overlapping_candidates() {
        let pattern = family("Serilog", &["Serilog", "Serilog.Sinks.Console", "Serilog.Sinks.File"], DetectionMethod::Pattern, 0.6);
        let dependency = family(
            "Serilog Ecosystem",
            &["Serilog", "Serilog.Sinks.Console", "Serilog.Sinks.File", "Serilog.Settings"],
            DetectionMethod::Dependency,
            0.8,
        );
        let unrelated = family("Polly", &["Polly", "Polly.Core"], DetectionMethod::Pattern, 0.7);

        let merged = merge_families(vec![pattern, unrelated, dependency]);
        assert_eq!(merged.len(), 2);

        let serilog = &merged[0];
        assert_eq!(serilog.name, "Serilog");
        assert_eq!(serilog.len(), 4);
        assert!((serilog.confidence - 0.7).abs() < 1e-6);
        assert_eq!(
            serilog.characteristics.detection_methods,
            Some(vec![DetectionMethod::Pattern, DetectionMethod::Dependency])
        );
    }

    #[test]
    fn test_merge_keeps_distinct_sets_apart() {
        let a = family("A", &["A", "B"], DetectionMethod::Pattern, 0.9);
        let b = family("B", &["A", "B", "C"], DetectionMethod::Metadata, 0.8);
        // 2/3 overlap does not exceed the threshold
        assert_eq!(merge_families(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_override_moves_package() {
        let families = vec![family("Pattern1", &["PkgA", "PkgB", "PkgC"], DetectionMethod::Pattern, 0.9)];
        let overrides: BTreeMap<_, _> = [("PkgA".to_string(), "TeamX".to_string())].into_iter().collect();
        let known: BTreeSet<&str> = ["PkgA", "PkgB", "PkgC"].into_iter().collect();

        let result = apply_manual_overrides(families, &overrides, &known, 2);
        let pattern = result.iter().find(|f| f.name == "Pattern1").unwrap();
        let team = result.iter().find(|f| f.name == "TeamX").unwrap();

        assert!(!pattern.contains("PkgA"));
        assert!(team.contains("PkgA"));
        assert_eq!(team.detection_method, DetectionMethod::Manual);
        assert_eq!(team.confidence, 1.0);
        assert_eq!(
            result.iter().filter(|f| f.contains("PkgA")).count(),
            1
        );
    }

    #[test]
    fn test_override_into_existing_family() {
        let families = vec![
            family("Logging", &["Serilog", "Serilog.Sinks.File"], DetectionMethod::Pattern, 0.7),
            family("Json", &["Newtonsoft.Json", "Newtonsoft.Json.Bson"], DetectionMethod::Pattern, 0.7),
        ];
        let overrides: BTreeMap<_, _> = [("Newtonsoft.Json".to_string(), "Logging".to_string())]
            .into_iter()
            .collect();
        let known: BTreeSet<&str> = ["Serilog", "Serilog.Sinks.File", "Newtonsoft.Json", "Newtonsoft.Json.Bson"]
            .into_iter()
            .collect();

        let result = apply_manual_overrides(families, &overrides, &known, 2);
        // "Json" fell to one member and is dropped
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].len(), 3);
        assert!(result[0].methods().contains(&DetectionMethod::Manual));
    }

    #[test]
    fn test_override_for_unknown_package_ignored() {
        let families = vec![family("A", &["A", "B"], DetectionMethod::Pattern, 0.9)];
        let overrides: BTreeMap<_, _> = [("Ghost".to_string(), "TeamX".to_string())].into_iter().collect();
        let known: BTreeSet<&str> = ["A", "B"].into_iter().collect();
        let result = apply_manual_overrides(families.clone(), &overrides, &known, 2);
        assert_eq!(result, families);
    }
}
