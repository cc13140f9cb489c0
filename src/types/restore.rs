//! Restore diagnostics

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreErrorKind {
    Warning,
    Error,
}

/// Coarse grouping of NuGet restore codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreErrorCategory {
    VersionConflict,
    DependencyConstraint,
    MissingPackage,
    Other,
}

impl RestoreErrorCategory {
    pub fn from_code(code: &str) -> Self {
        match code {
            "NU1107" | "NU1605" => Self::VersionConflict,
            "NU1608" => Self::DependencyConstraint,
            "NU1101" | "NU1102" => Self::MissingPackage,
            _ => Self::Other,
        }
    }

    /// What the user should look at next
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::VersionConflict => {
                "Projects require incompatible versions; align them or add an explicit reference to the higher version"
            }
            Self::DependencyConstraint => {
                "A resolved version falls outside a dependency's declared range; upgrade the constraining package too"
            }
            Self::MissingPackage => {
                "The package or version could not be found; check the name and the configured package sources"
            }
            Self::Other => "Inspect the full restore output for details",
        }
    }
}

impl std::fmt::Display for RestoreErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionConflict => write!(f, "version-conflict"),
            Self::DependencyConstraint => write!(f, "dependency-constraint"),
            Self::MissingPackage => write!(f, "missing-package"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// One diagnostic line from `dotnet restore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreError {
    #[serde(rename = "type")]
    pub kind: RestoreErrorKind,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub full_text: String,
}

impl RestoreError {
    /// Code used when the restore process itself could not run
    pub const RESTORE_FAILED: &'static str = "RESTORE_FAILED";

    pub fn category(&self) -> RestoreErrorCategory {
        RestoreErrorCategory::from_code(&self.code)
    }

    pub fn is_error(&self) -> bool {
        self.kind == RestoreErrorKind::Error
    }

    /// Entry standing in for a restore that failed to run at all
    pub fn restore_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: RestoreErrorKind::Error,
            code: Self::RESTORE_FAILED.to_string(),
            full_text: message.clone(),
            message,
            project_path: None,
        }
    }
}
