//! Oracle-assisted family detection

use serde_json::{Value, json};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::ai::{Oracle, OracleOutcome};
use crate::config::FamiliesConfig;
use crate::constants::families::{AI_BATCH_SIZE, AI_DEFAULT_CONFIDENCE, AI_OVERLAP_PENALTY};
use crate::types::{
    DetectionMethod, FamilyCharacteristics, PackageFamily, json_f64, json_string,
    json_string_array,
};

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "families": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "packages": {"type": "array", "items": {"type": "string"}},
                        "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                        "reasoning": {"type": "string"}
                    },
                    "required": ["name", "packages"]
                }
            }
        },
        "required": ["families"]
    })
}

fn build_prompt(names: &[String]) -> String {
    format!(
        "Group these NuGet packages into families of related packages that are \
usually released and upgraded together (same vendor product, same framework, \
plugins of one core library). Only use package names from the list. Each family \
needs at least two packages, a short name, a confidence between 0 and 1, and a \
one-sentence reasoning. Leave unrelated packages out.\n\nPackages:\n{}",
        names
            .iter()
            .map(|n| format!("- {}", n))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

pub(super) async fn detect(
    names: &[String],
    oracle: &Oracle,
    config: &FamiliesConfig,
) -> Vec<PackageFamily> {
    let schema = schema();
    let mut candidates = Vec::new();

    for (batch, chunk) in names.chunks(AI_BATCH_SIZE).enumerate() {
        match oracle.ask(&build_prompt(chunk), &schema).await {
            OracleOutcome::Parsed(value) => {
                let found = parse_groupings(&value, chunk, config);
                debug!("AI batch {} proposed {} families", batch, found.len());
                candidates.extend(found);
            }
            OracleOutcome::Malformed(reason) => {
                warn!("AI family detection skipped batch {}: {}", batch, reason);
            }
            OracleOutcome::Unavailable(reason) => {
                warn!("AI family detection unavailable: {}", reason);
                break;
            }
        }
    }

    resolve_overlaps(candidates, config.min_family_size)
}

/// Accepts `{"families": [...]}`, `{"groups": [...]}` or a bare array
pub(super) fn parse_groupings(
    value: &Value,
    allowed: &[String],
    config: &FamiliesConfig,
) -> Vec<PackageFamily> {
    let entries: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => value
            .get("families")
            .or_else(|| value.get("groups"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };
    let allowed: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();

    entries
        .iter()
        .filter_map(|entry| {
            let name = json_string(entry, "name").filter(|n| !n.trim().is_empty())?;
            let packages: BTreeSet<String> = json_string_array(entry, "packages")
                .into_iter()
                .filter(|p| allowed.contains(p.as_str()))
                .collect();
            if packages.len() < 2 {
                debug!("Dropping AI family '{}': fewer than two known packages", name);
                return None;
            }
            let confidence = json_f64(entry, "confidence")
                .map(|c| c as f32)
                .unwrap_or(AI_DEFAULT_CONFIDENCE)
                .clamp(0.0, 1.0);
            if confidence < config.min_confidence {
                debug!("Dropping AI family '{}': confidence {:.2}", name, confidence);
                return None;
            }
            Some(
                PackageFamily::new(name, packages, DetectionMethod::Ai, confidence)
                    .with_characteristics(FamilyCharacteristics {
                        reasoning: json_string(entry, "reasoning"),
                        ..Default::default()
                    }),
            )
        })
        .collect()
}

/// Greedy assignment, most confident family first. A family that lost
/// members keeps the rest at a penalty if enough remain.
pub(super) fn resolve_overlaps(
    mut candidates: Vec<PackageFamily>,
    min_size: usize,
) -> Vec<PackageFamily> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut resolved = Vec::new();

    for mut family in candidates {
        let unclaimed: Vec<String> = family
            .packages
            .iter()
            .filter(|p| !claimed.contains(*p))
            .cloned()
            .collect();

        if unclaimed.len() < family.len() {
            if unclaimed.len() < min_size {
                debug!("AI family '{}' absorbed by stronger families", family.name);
                continue;
            }
            family.packages = unclaimed;
            family.confidence *= AI_OVERLAP_PENALTY;
        }

        claimed.extend(family.packages.iter().cloned());
        resolved.push(family);
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::ScriptedProvider;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_groupings_filters_entries() {
        let value = json!({
            "families": [
                {"name": "Azure", "packages": ["Azure.Core", "Azure.Identity", "Ghost"], "confidence": 0.9},
                {"name": "Lonely", "packages": ["Polly", "Ghost"]},
                {"packages": ["Azure.Core", "Polly"]},
                {"name": "Weak", "packages": ["Azure.Core", "Polly"], "confidence": "0.2"}
            ]
        });
        let allowed = names(&["Azure.Core", "Azure.Identity", "Polly"]);
        let families = parse_groupings(&value, &allowed, &FamiliesConfig::default());
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].packages, vec!["Azure.Core", "Azure.Identity"]);
        assert_eq!(families[0].detection_method, DetectionMethod::Ai);
    }

    #[test]
    fn test_parse_groupings_bare_array_default_confidence() {
        let value = json!([{"name": "Pair", "packages": ["A", "B"]}]);
        let families = parse_groupings(&value, &names(&["A", "B"]), &FamiliesConfig::default());
        assert_eq!(families[0].confidence, AI_DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_resolve_overlaps() {
        let strong = PackageFamily::new("Strong", names(&["A", "B"]), DetectionMethod::Ai, 0.9);
        let partial =
            PackageFamily::new("Partial", names(&["B", "C", "D"]), DetectionMethod::Ai, 0.8);
        let swallowed = PackageFamily::new("Gone", names(&["A", "C"]), DetectionMethod::Ai, 0.7);

        let resolved = resolve_overlaps(vec![swallowed, partial, strong], 2);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].name, "Strong");
        assert_eq!(resolved[1].packages, vec!["C", "D"]);
        assert!((resolved[1].confidence - 0.64).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_detect_with_fenced_reply() {
        let provider = ScriptedProvider::text(
            "Here you go:\n```json\n{\"families\": [{\"name\": \"Identity\", \"packages\": [\"Azure.Identity\", \"Microsoft.Identity.Client\"], \"confidence\": 0.85}]}\n```",
        );
        let oracle = Oracle::with_provider(provider.shared());
        let list = names(&["Azure.Identity", "Microsoft.Identity.Client", "Polly"]);
        let families = detect(&list, &oracle, &FamiliesConfig::default()).await;
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "Identity");
    }

    #[tokio::test]
    async fn test_detect_malformed_contributes_nothing() {
        let oracle = Oracle::with_provider(ScriptedProvider::text("I cannot help").shared());
        let list = names(&["A", "B"]);
        assert!(detect(&list, &oracle, &FamiliesConfig::default()).await.is_empty());
    }
}
