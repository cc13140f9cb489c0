//! Package family types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a family was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Pattern,
    Dependency,
    Ai,
    Metadata,
    Manual,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Dependency => write!(f, "dependency"),
            Self::Ai => write!(f, "ai"),
            Self::Metadata => write!(f, "metadata"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// How members of a family should be upgraded relative to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyUpdateStrategy {
    #[default]
    Together,
    Sequential,
    Independent,
}

impl std::str::FromStr for FamilyUpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "together" => Ok(Self::Together),
            "sequential" => Ok(Self::Sequential),
            "independent" => Ok(Self::Independent),
            _ => Err(format!(
                "Unknown update strategy: {}. Valid values: together, sequential, independent",
                s
            )),
        }
    }
}

/// Free-form evidence describing why packages were grouped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyCharacteristics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_methods: Option<Vec<DetectionMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A group of related packages that usually move together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFamily {
    pub id: String,
    pub name: String,
    pub packages: Vec<String>,
    pub detection_method: DetectionMethod,
    pub confidence: f32,
    pub characteristics: FamilyCharacteristics,
    pub update_strategy: FamilyUpdateStrategy,
}

impl PackageFamily {
    /// Build a family with a derived id; member names are sorted and deduplicated.
    pub fn new(
        name: impl Into<String>,
        packages: impl IntoIterator<Item = String>,
        detection_method: DetectionMethod,
        confidence: f32,
    ) -> Self {
        let name = name.into();
        let packages: BTreeSet<String> = packages.into_iter().collect();
        Self {
            id: family_id(detection_method, &name),
            name,
            packages: packages.into_iter().collect(),
            detection_method,
            confidence: confidence.clamp(0.0, 1.0),
            characteristics: FamilyCharacteristics::default(),
            update_strategy: FamilyUpdateStrategy::default(),
        }
    }

    pub fn with_characteristics(mut self, characteristics: FamilyCharacteristics) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn with_update_strategy(mut self, strategy: FamilyUpdateStrategy) -> Self {
        self.update_strategy = strategy;
        self
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.iter().any(|p| p == package)
    }

    pub fn member_set(&self) -> BTreeSet<&str> {
        self.packages.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Every method that contributed to this family
    pub fn methods(&self) -> Vec<DetectionMethod> {
        self.characteristics
            .detection_methods
            .clone()
            .unwrap_or_else(|| vec![self.detection_method])
    }
}

/// Stable family id: `<method>-<slug>`
pub fn family_id(method: DetectionMethod, name: &str) -> String {
    format!("{}-{}", method, super::utils::slugify(name))
}

/// Jaccard overlap between two member sets
pub fn jaccard(a: &PackageFamily, b: &PackageFamily) -> f32 {
    let left = a.member_set();
    let right = b.member_set();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_new_sorts_and_dedups() {
        let family = PackageFamily::new(
            "Serilog",
            vec!["Serilog.Sinks.File".into(), "Serilog".into(), "Serilog".into()],
            DetectionMethod::Pattern,
            1.4,
        );
        assert_eq!(family.packages, vec!["Serilog", "Serilog.Sinks.File"]);
        assert_eq!(family.id, "pattern-serilog");
        assert_eq!(family.confidence, 1.0);
    }

    #[test]
    fn test_jaccard() {
        let a = PackageFamily::new(
            "a",
            ["A", "B", "C"].map(String::from),
            DetectionMethod::Pattern,
            0.8,
        );
        let b = PackageFamily::new(
            "b",
            ["B", "C", "D"].map(String::from),
            DetectionMethod::Ai,
            0.8,
        );
        assert!((jaccard(&a, &b) - 0.5).abs() < f32::EPSILON);
        assert!((jaccard(&a, &a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_update_strategy_parse() {
        assert_eq!(
            "Sequential".parse::<FamilyUpdateStrategy>().unwrap(),
            FamilyUpdateStrategy::Sequential
        );
        assert!("sometimes".parse::<FamilyUpdateStrategy>().is_err());
    }
}
