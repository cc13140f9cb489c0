//! NuGet registration API client
//!
//! Fetches authors, tags and dependency groups for one package version from
//! `{base}/{id}/index.json`. Large packages page their registration; pages
//! without inlined items are fetched separately.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::RegistryConfig;
use crate::types::{NuplanError, Result, compare_versions};

/// Registry metadata of one package version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub id: String,
    pub version: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub dependency_groups: Vec<DependencyGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    /// Dependency id -> version range
    pub dependencies: BTreeMap<String, String>,
}

impl PackageMetadata {
    /// Dependencies across every target framework; the first range seen wins
    pub fn all_dependencies(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for group in &self.dependency_groups {
            for (id, range) in &group.dependencies {
                merged.entry(id.clone()).or_insert_with(|| range.clone());
            }
        }
        merged
    }

    pub fn primary_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct RegistrationIndex {
    #[serde(default)]
    items: Vec<RegistrationPage>,
}

#[derive(Debug, Deserialize)]
struct RegistrationPage {
    #[serde(rename = "@id")]
    id: String,
    #[serde(default)]
    items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationLeaf {
    catalog_entry: CatalogEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    id: String,
    version: String,
    #[serde(default)]
    authors: StringOrList,
    #[serde(default)]
    tags: StringOrList,
    #[serde(default)]
    dependency_groups: Vec<RawDependencyGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl StringOrList {
    fn split(self, separator: fn(char) -> bool) -> Vec<String> {
        let raw = match self {
            Self::One(s) => s.split(separator).map(str::to_string).collect(),
            Self::Many(list) => list,
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDependencyGroup {
    #[serde(default)]
    target_framework: Option<String>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    id: String,
    #[serde(default)]
    range: Option<String>,
}

impl From<CatalogEntry> for PackageMetadata {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            version: entry.version,
            authors: entry.authors.split(|c| c == ','),
            tags: entry.tags.split(char::is_whitespace),
            dependency_groups: entry
                .dependency_groups
                .into_iter()
                .map(|group| DependencyGroup {
                    target_framework: group.target_framework,
                    dependencies: group
                        .dependencies
                        .into_iter()
                        .map(|d| (d.id, d.range.unwrap_or_default()))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// The leaf matching `version`, else the highest version listed
fn select_entry(leaves: Vec<RegistrationLeaf>, version: &str) -> Option<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = leaves.into_iter().map(|l| l.catalog_entry).collect();
    if let Some(pos) = entries
        .iter()
        .position(|e| e.version.eq_ignore_ascii_case(version))
    {
        return Some(entries.swap_remove(pos));
    }
    entries
        .into_iter()
        .max_by(|a, b| compare_versions(&a.version, &b.version))
}

pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("nuplan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NuplanError::Registry(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn index_url(&self, id: &str) -> String {
        format!("{}/{}/index.json", self.base_url, id.to_lowercase())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NuplanError::Registry(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(NuplanError::Registry(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NuplanError::Registry(format!("Unexpected response from {}: {}", url, e)))
    }

    #[instrument(skip(self))]
    pub async fn fetch_metadata(&self, id: &str, version: &str) -> Result<PackageMetadata> {
        let index: RegistrationIndex = self.get_json(&self.index_url(id)).await?;

        let mut leaves = Vec::new();
        for page in index.items {
            match page.items {
                Some(items) => leaves.extend(items),
                None => {
                    let fetched: RegistrationPage = self.get_json(&page.id).await?;
                    leaves.extend(fetched.items.unwrap_or_default());
                }
            }
        }

        let entry = select_entry(leaves, version).ok_or_else(|| {
            NuplanError::Registry(format!("No registration entries for {}", id))
        })?;
        debug!("Registry metadata for {} resolved to {}", id, entry.version);
        Ok(entry.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> RegistrationIndex {
        serde_json::from_value(json!({
            "items": [{
                "@id": "https://example/page/1.json",
                "items": [
                    {"catalogEntry": {
                        "id": "Serilog.Sinks.Console",
                        "version": "4.1.0",
                        "authors": "Serilog Contributors, Nick",
                        "tags": "serilog console terminal",
                        "dependencyGroups": [
                            {"targetFramework": "net5.0", "dependencies": [
                                {"id": "Serilog", "range": "[2.10.0, )"}
                            ]},
                            {"targetFramework": "netstandard2.0", "dependencies": [
                                {"id": "Serilog", "range": "[2.8.0, )"},
                                {"id": "System.Console"}
                            ]}
                        ]
                    }},
                    {"catalogEntry": {
                        "id": "Serilog.Sinks.Console",
                        "version": "5.0.1",
                        "authors": ["Serilog Contributors"],
                        "tags": ["serilog", "console"]
                    }}
                ]
            }]
        }))
        .unwrap()
    }

    fn leaves() -> Vec<RegistrationLeaf> {
        index()
            .items
            .into_iter()
            .flat_map(|p| p.items.unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_select_exact_version() {
        let metadata: PackageMetadata = select_entry(leaves(), "4.1.0").unwrap().into();
        assert_eq!(metadata.authors, vec!["Serilog Contributors", "Nick"]);
        assert_eq!(metadata.tags, vec!["serilog", "console", "terminal"]);
        assert_eq!(metadata.primary_author(), Some("Serilog Contributors"));

        let deps = metadata.all_dependencies();
        assert_eq!(deps["Serilog"], "[2.10.0, )");
        assert_eq!(deps["System.Console"], "");
    }

    #[test]
    fn test_select_falls_back_to_highest() {
        let metadata: PackageMetadata = select_entry(leaves(), "9.9.9").unwrap().into();
        assert_eq!(metadata.version, "5.0.1");
        assert_eq!(metadata.tags, vec!["serilog", "console"]);
        assert!(metadata.dependency_groups.is_empty());
    }

    #[test]
    fn test_index_url_is_lowercase() {
        let client = RegistryClient::new(&RegistryConfig {
            base_url: "https://api.nuget.org/v3/registration5-semver1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.index_url("Newtonsoft.Json"),
            "https://api.nuget.org/v3/registration5-semver1/newtonsoft.json/index.json"
        );
    }
}
