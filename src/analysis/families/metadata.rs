//! Registry-metadata family detection (shared author or tag)

use std::collections::{BTreeMap, BTreeSet};

use crate::config::FamiliesConfig;
use crate::constants::families::METADATA_CONFIDENCE;
use crate::dotnet::PackageMetadata;
use crate::types::{
    DetectionMethod, FamilyCharacteristics, FamilyUpdateStrategy, PackageFamily, capitalize_first,
    slugify,
};

pub(super) fn detect(
    names: &[String],
    metadata: Option<&BTreeMap<String, PackageMetadata>>,
    config: &FamiliesConfig,
) -> Vec<PackageFamily> {
    let Some(metadata) = metadata else {
        return Vec::new();
    };

    let mut by_author: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut by_tag: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

    for name in names {
        let Some(meta) = metadata.get(name) else {
            continue;
        };
        for author in &meta.authors {
            by_author.entry(author).or_default().insert(name);
        }
        for tag in &meta.tags {
            by_tag.entry(tag.to_lowercase()).or_default().insert(name);
        }
    }

    let min_size = config.min_family_size;
    let members = |set: &BTreeSet<&str>| set.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    let authored = by_author
        .iter()
        .filter(|(_, set)| set.len() >= min_size)
        .map(|(author, set)| {
            PackageFamily::new(*author, members(set), DetectionMethod::Metadata, METADATA_CONFIDENCE)
                .with_update_strategy(FamilyUpdateStrategy::Independent)
                .with_characteristics(FamilyCharacteristics {
                    author: Some(author.to_string()),
                    ..Default::default()
                })
        });

    let tagged = by_tag
        .iter()
        .filter(|(_, set)| set.len() >= min_size)
        .map(|(tag, set)| {
            let mut family = PackageFamily::new(
                capitalize_first(tag),
                members(set),
                DetectionMethod::Metadata,
                METADATA_CONFIDENCE,
            )
            .with_update_strategy(FamilyUpdateStrategy::Independent)
            .with_characteristics(FamilyCharacteristics {
                tags: Some(vec![tag.clone()]),
                ..Default::default()
            });
            // Keep tag ids apart from author ids with the same slug
            family.id = format!("{}-tag-{}", DetectionMethod::Metadata, slugify(tag));
            family
        });

    authored.chain(tagged).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(authors: &[&str], tags: &[&str]) -> PackageMetadata {
        PackageMetadata {
            authors: authors.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_by_author_and_tag() {
        let names: Vec<String> = ["Polly", "Polly.Extensions.Http", "Refit"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let metadata: BTreeMap<String, PackageMetadata> = [
            ("Polly".to_string(), meta(&["App vNext"], &["Resilience", "http"])),
            ("Polly.Extensions.Http".to_string(), meta(&["App vNext"], &["http"])),
            ("Refit".to_string(), meta(&[".NET Foundation"], &["HTTP", "rest"])),
        ]
        .into_iter()
        .collect();

        let families = detect(&names, Some(&metadata), &FamiliesConfig::default());
        assert_eq!(families.len(), 2);

        let author = &families[0];
        assert_eq!(author.name, "App vNext");
        assert_eq!(author.confidence, METADATA_CONFIDENCE);
        assert_eq!(author.characteristics.author.as_deref(), Some("App vNext"));

        let tag = &families[1];
        assert_eq!(tag.name, "Http");
        assert_eq!(tag.len(), 3);
        assert_eq!(tag.id, "metadata-tag-http");
    }

    #[test]
    fn test_no_metadata_detects_nothing() {
        let names = vec!["A".to_string(), "B".to_string()];
        assert!(detect(&names, None, &FamiliesConfig::default()).is_empty());
    }
}
