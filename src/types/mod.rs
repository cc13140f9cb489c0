pub mod conflict;
pub mod error;
pub mod execution;
pub mod family;
pub mod package;
pub mod restore;
pub mod strategy;
pub mod utils;

pub use conflict::*;
pub use error::{
    ErrorCategory, ErrorClassifier, LlmError, NuplanError, Result, ValidationError,
    ValidationErrorKind,
};
pub use execution::*;
pub use family::*;
pub use package::*;
pub use restore::*;
pub use strategy::*;
pub use utils::{capitalize_first, json_f64, json_string, json_string_array, preview, slugify};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outdated updates grouped by project path
pub type UpdatesByProject = BTreeMap<String, Vec<PackageUpdate>>;

// =============================================================================
// Domain Newtypes
// =============================================================================

/// Type-safe wrapper for upgrade run IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Flatten grouped updates, keeping project order
pub fn flatten_updates(updates: &UpdatesByProject) -> Vec<PackageUpdate> {
    updates.values().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_unique() {
        assert_ne!(RunId::generate(), RunId::generate());
        assert_eq!(RunId::new("abc").as_str(), "abc");
    }

    #[test]
    fn test_flatten_updates() {
        let mut updates = UpdatesByProject::new();
        updates.insert(
            "B.csproj".into(),
            vec![PackageUpdate::new("Y", "1.0.0", "2.0.0", "B.csproj")],
        );
        updates.insert(
            "A.csproj".into(),
            vec![PackageUpdate::new("X", "1.0.0", "1.1.0", "A.csproj")],
        );
        let flat = flatten_updates(&updates);
        assert_eq!(flat[0].package_name, "X");
        assert_eq!(flat.len(), 2);
    }
}
