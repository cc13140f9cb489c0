//! Package Family Detection
//!
//! Clusters related packages so they can be upgraded as a unit. Four
//! detectors propose candidates in a fixed order (pattern, dependency,
//! metadata, AI); candidates are then merged, validated against the size and
//! confidence thresholds, and finally adjusted by manual overrides.

mod ai;
mod dependency;
mod merge;
mod metadata;
mod pattern;

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use crate::ai::Oracle;
use crate::config::FamiliesConfig;
use crate::dotnet::PackageMetadata;
use crate::types::{DetectionMethod, PackageFamily, PackageNode};

pub struct FamilyDetector {
    config: FamiliesConfig,
    oracle: Oracle,
}

impl FamilyDetector {
    pub fn new(config: FamiliesConfig, oracle: Oracle) -> Self {
        Self { config, oracle }
    }

    #[instrument(skip_all, fields(packages = packages.len()))]
    pub async fn detect_package_families(
        &self,
        packages: &BTreeMap<String, PackageNode>,
        metadata: Option<&BTreeMap<String, PackageMetadata>>,
    ) -> Vec<PackageFamily> {
        let names: Vec<String> = packages.keys().cloned().collect();
        let mut candidates = Vec::new();

        if self.config.enable_pattern {
            candidates.extend(pattern::detect(&names, &self.config));
        }
        if self.config.enable_dependency {
            candidates.extend(dependency::detect(packages, &self.config));
        }
        if self.config.enable_metadata {
            candidates.extend(metadata::detect(&names, metadata, &self.config));
        }
        if self.config.enable_ai && self.oracle.is_enabled() {
            candidates.extend(ai::detect(&names, &self.oracle, &self.config).await);
        }

        let families = self.finish(candidates, packages.keys().map(String::as_str).collect());
        info!("Detected {} package families", families.len());
        families
    }

    /// validate -> merge -> validate -> override
    fn finish(&self, candidates: Vec<PackageFamily>, known: BTreeSet<&str>) -> Vec<PackageFamily> {
        debug!("{} family candidates", candidates.len());
        let candidates = self.validate(candidates);
        let merged = self.validate(merge::merge_families(candidates));
        merge::apply_manual_overrides(
            merged,
            &self.config.manual_overrides,
            &known,
            self.config.min_family_size,
        )
    }

    /// Keep families meeting the size and confidence thresholds
    fn validate(&self, families: Vec<PackageFamily>) -> Vec<PackageFamily> {
        families
            .into_iter()
            .filter(|family| {
                let keep = family.detection_method == DetectionMethod::Manual
                    || (family.len() >= self.config.min_family_size
                        && family.confidence >= self.config.min_confidence);
                if !keep {
                    debug!(
                        "Discarding family '{}' ({} packages, confidence {:.2})",
                        family.name,
                        family.len(),
                        family.confidence
                    );
                }
                keep
            })
            .collect()
    }
}
