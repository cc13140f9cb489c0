//! Name-based family detection: dotted prefixes, sibling suffixes, and
//! user-supplied regexes.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::FamiliesConfig;
use crate::constants::families::{
    CUSTOM_PATTERN_CONFIDENCE, GENERIC_PREFIX_RATIO, GROUP_SIZE_SATURATION, MAX_PREFIX_DEPTH,
    MIN_PREFIX_CHARS, PATTERN_LENGTH_SATURATION, SUFFIX_VOCABULARY,
};
use crate::types::{DetectionMethod, FamilyCharacteristics, PackageFamily};

/// Mean of the pattern-length score and the group-size score
pub(super) fn pattern_confidence(pattern: &str, size: usize) -> f32 {
    let length = (pattern.chars().count() as f32 / PATTERN_LENGTH_SATURATION).min(1.0);
    let group = (size as f32 / GROUP_SIZE_SATURATION).min(1.0);
    (length + group) / 2.0
}

fn in_prefix(name: &str, prefix: &str) -> bool {
    name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

pub(super) fn detect(names: &[String], config: &FamiliesConfig) -> Vec<PackageFamily> {
    let mut families = prefix_families(names, config.min_family_size);
    let mut seen: BTreeSet<Vec<String>> = families.iter().map(|f| f.packages.clone()).collect();

    for family in suffix_families(names, config.min_family_size) {
        if seen.insert(family.packages.clone()) {
            families.push(family);
        }
    }

    families.extend(custom_families(names, config));
    debug!("Pattern detector proposed {} families", families.len());
    families
}

fn prefix_families(names: &[String], min_size: usize) -> Vec<PackageFamily> {
    let total = names.len();
    let mut prefixes = BTreeSet::new();
    for name in names {
        let segments: Vec<&str> = name.split('.').collect();
        let deepest = MAX_PREFIX_DEPTH.min(segments.len().saturating_sub(1));
        for depth in 1..=deepest {
            prefixes.insert(segments[..depth].join("."));
        }
    }

    // Member set -> longest prefix producing it
    let mut best: BTreeMap<Vec<String>, String> = BTreeMap::new();
    for prefix in prefixes {
        if prefix.chars().count() <= MIN_PREFIX_CHARS {
            continue;
        }
        let members: Vec<String> = names
            .iter()
            .filter(|n| in_prefix(n, &prefix))
            .cloned()
            .collect();
        if members.len() < min_size || members.len() as f32 >= GENERIC_PREFIX_RATIO * total as f32 {
            continue;
        }
        let slot = best.entry(members).or_default();
        if prefix.len() > slot.len() {
            *slot = prefix;
        }
    }

    let mut families: Vec<PackageFamily> = best
        .into_iter()
        .map(|(members, prefix)| {
            let confidence = pattern_confidence(&prefix, members.len());
            PackageFamily::new(prefix.clone(), members, DetectionMethod::Pattern, confidence)
                .with_characteristics(FamilyCharacteristics {
                    common_prefix: Some(prefix),
                    ..Default::default()
                })
        })
        .collect();
    families.sort_by(|a, b| a.name.cmp(&b.name));
    families
}

fn suffix_families(names: &[String], min_size: usize) -> Vec<PackageFamily> {
    let present: BTreeSet<&str> = names.iter().map(String::as_str).collect();

    let mut bases: BTreeSet<&str> = BTreeSet::new();
    for name in names {
        for suffix in SUFFIX_VOCABULARY {
            if let Some(base) = name.strip_suffix(suffix)
                && let Some(base) = base.strip_suffix('.')
                && !base.is_empty()
            {
                bases.insert(base);
            }
        }
    }

    let mut families = Vec::new();
    for base in bases {
        let mut members = Vec::new();
        let mut suffixes = Vec::new();
        if present.contains(base) {
            members.push(base.to_string());
        }
        for suffix in SUFFIX_VOCABULARY {
            let sibling = format!("{}.{}", base, suffix);
            if present.contains(sibling.as_str()) {
                members.push(sibling);
                suffixes.push(*suffix);
            }
        }
        if members.len() < min_size {
            continue;
        }
        let confidence = pattern_confidence(base, members.len());
        families.push(
            PackageFamily::new(base, members, DetectionMethod::Pattern, confidence)
                .with_characteristics(FamilyCharacteristics {
                    common_prefix: Some(base.to_string()),
                    common_suffix: Some(suffixes.join("/")),
                    ..Default::default()
                }),
        );
    }
    families
}

fn custom_families(names: &[String], config: &FamiliesConfig) -> Vec<PackageFamily> {
    let mut families = Vec::new();
    for custom in &config.custom_patterns {
        let regex = match Regex::new(&custom.pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!("Skipping custom pattern '{}': {}", custom.name, e);
                continue;
            }
        };
        let members: Vec<String> = names
            .iter()
            .filter(|n| regex.is_match(n))
            .cloned()
            .collect();
        if members.len() < config.min_family_size {
            continue;
        }
        families.push(
            PackageFamily::new(
                custom.name.clone(),
                members,
                DetectionMethod::Pattern,
                CUSTOM_PATTERN_CONFIDENCE,
            )
            .with_update_strategy(custom.update_strategy)
            .with_characteristics(FamilyCharacteristics {
                reasoning: Some(format!("matches /{}/", custom.pattern)),
                ..Default::default()
            }),
        );
    }
    families
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomPattern;
    use crate::types::FamilyUpdateStrategy;

    fn names(list: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        names.sort();
        names
    }

    fn solution() -> Vec<String> {
        names(&[
            "AutoMapper",
            "AutoMapper.Extensions.Microsoft.DependencyInjection",
            "Microsoft.Extensions.Logging",
            "Microsoft.Extensions.Logging.Abstractions",
            "Microsoft.Extensions.Options",
            "Newtonsoft.Json",
            "Polly",
            "Serilog",
            "Serilog.Sinks.Console",
            "Serilog.Sinks.File",
        ])
    }

    fn find<'a>(families: &'a [PackageFamily], name: &str) -> Option<&'a PackageFamily> {
        families.iter().find(|f| f.name == name)
    }

    #[test]
    fn test_prefix_groups_keep_longest_prefix() {
        let families = detect(&solution(), &FamiliesConfig::default());

        assert!(find(&families, "Microsoft").is_none());
        let extensions = find(&families, "Microsoft.Extensions").unwrap();
        assert_eq!(extensions.len(), 3);

        let serilog = find(&families, "Serilog").unwrap();
        assert_eq!(serilog.len(), 3);
        assert_eq!(find(&families, "Serilog.Sinks").unwrap().len(), 2);
        assert_eq!(find(&families, "AutoMapper").unwrap().len(), 2);
        assert!(find(&families, "Newtonsoft").is_none());
    }

    #[test]
    fn test_suffix_group_not_duplicated() {
        let families = detect(&solution(), &FamiliesConfig::default());
        let logging: Vec<_> = families
            .iter()
            .filter(|f| f.packages
                == vec![
                    "Microsoft.Extensions.Logging".to_string(),
                    "Microsoft.Extensions.Logging.Abstractions".to_string(),
                ])
            .collect();
        assert_eq!(logging.len(), 1);
    }

    #[test]
    fn test_suffix_siblings_without_shared_prefix_group() {
        let list = names(&["Acme.Billing.Client", "Acme.Billing.Contracts", "Other.One", "Other.Two", "Zed"]);
        let families = suffix_families(&list, 2);
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "Acme.Billing");
        assert_eq!(
            families[0].characteristics.common_suffix.as_deref(),
            Some("Client/Contracts")
        );
    }

    #[test]
    fn test_generic_prefix_discarded() {
        let list = names(&[
            "Contoso.A",
            "Contoso.B",
            "Contoso.C",
            "Contoso.D",
            "Contoso.E",
        ]);
        assert!(prefix_families(&list, 2).is_empty());
    }

    #[test]
    fn test_short_prefix_discarded() {
        let list = names(&["Abc.One", "Abc.Two", "Other.X", "Other2", "Else"]);
        let families = prefix_families(&list, 2);
        assert!(families.iter().all(|f| f.name != "Abc"));
    }

    #[test]
    fn test_confidence_formula() {
        // 10 chars / 20 = 0.5, 3 members / 10 = 0.3
        assert!((pattern_confidence("Serilog.Ab", 3) - 0.4).abs() < 1e-6);
        assert_eq!(pattern_confidence("A.Very.Long.Package.Prefix", 40), 1.0);
    }

    #[test]
    fn test_custom_patterns() {
        let config = FamiliesConfig {
            custom_patterns: vec![
                CustomPattern {
                    name: "Test tooling".to_string(),
                    pattern: "^(xunit|Moq)".to_string(),
                    update_strategy: FamilyUpdateStrategy::Independent,
                },
                CustomPattern {
                    name: "Broken".to_string(),
                    pattern: "([".to_string(),
                    update_strategy: FamilyUpdateStrategy::Together,
                },
            ],
            ..Default::default()
        };
        let list = names(&["xunit", "xunit.runner.visualstudio", "Moq", "Polly"]);
        let families = custom_families(&list, &config);
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].len(), 3);
        assert_eq!(families[0].confidence, CUSTOM_PATTERN_CONFIDENCE);
        assert_eq!(families[0].update_strategy, FamilyUpdateStrategy::Independent);
    }
}
