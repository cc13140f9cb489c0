//! `dotnet` CLI output parsing
//!
//! Line-oriented extraction of records from `dotnet list package` and
//! `dotnet restore` output. Parsers never fail: unrecognised lines are
//! skipped, so a changed CLI format degrades to fewer records.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::constants::process::RESTORE_CODES;
use crate::types::{PackageUpdate, RestoreError, RestoreErrorKind};

static PROJECT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Project\s+['"`]?(.+?)['"`]?\s+has the following"#).expect("project header regex")
});

static NUGET_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bNU\d{4}\b").expect("nuget code regex"));

static CSPROJ_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S.*?\.csproj)\s*:\s").expect("csproj prefix regex"));

static CODE_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bNU\d{4}\s*:\s*(.*)$").expect("code message regex"));

static TRAILING_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\[[^\]]+\]\s*$").expect("trailing target regex"));

// =============================================================================
// Outdated listing
// =============================================================================

/// Parse `dotnet list package --outdated` output.
///
/// `expected_project` always wins over project headers found in the text;
/// without either, updates carry an empty project path.
pub fn parse_outdated(text: &str, expected_project: Option<&str>) -> Vec<PackageUpdate> {
    let mut updates = Vec::new();
    let mut current_project: Option<String> = None;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some(caps) = PROJECT_HEADER.captures(trimmed) {
            current_project = Some(caps[1].to_string());
            continue;
        }

        if !trimmed.starts_with('>') {
            continue;
        }

        // > Name Requested Resolved Latest
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < 5 {
            continue;
        }

        let project = expected_project
            .map(str::to_string)
            .or_else(|| current_project.clone())
            .unwrap_or_default();

        updates.push(PackageUpdate::new(tokens[1], tokens[3], tokens[4], project));
    }

    updates
}

// =============================================================================
// Package listing (--include-transitive)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedPackage {
    pub name: String,
    /// Requested range, top-level references only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested: Option<String>,
    pub resolved: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageListing {
    pub top_level: Vec<ListedPackage>,
    pub transitive: Vec<ListedPackage>,
}

impl PackageListing {
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty() && self.transitive.is_empty()
    }

    pub fn resolved_version(&self, name: &str) -> Option<&str> {
        self.top_level
            .iter()
            .chain(&self.transitive)
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.resolved.as_str())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ListingSection {
    None,
    TopLevel,
    Transitive,
}

/// Parse `dotnet list package [--include-transitive]` output.
///
/// Target framework sections are merged; the first occurrence of a package
/// wins.
pub fn parse_package_list(text: &str) -> PackageListing {
    let mut listing = PackageListing::default();
    let mut seen_top = HashSet::new();
    let mut seen_transitive = HashSet::new();
    let mut section = ListingSection::None;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Top-level Package") {
            section = ListingSection::TopLevel;
            continue;
        }
        if trimmed.starts_with("Transitive Package") {
            section = ListingSection::Transitive;
            continue;
        }
        if !trimmed.starts_with('>') {
            continue;
        }

        // "(A)" marks auto-referenced packages
        let tokens: Vec<&str> = trimmed
            .split_whitespace()
            .filter(|t| *t != "(A)")
            .collect();
        if tokens.len() < 3 {
            continue;
        }
        let name = tokens[1].to_string();
        let resolved = tokens[tokens.len() - 1].to_string();

        match section {
            ListingSection::TopLevel => {
                if !seen_top.insert(name.clone()) {
                    continue;
                }
                let requested = (tokens.len() > 3).then(|| tokens[2..tokens.len() - 1].join(" "));
                listing.top_level.push(ListedPackage {
                    name,
                    requested,
                    resolved,
                });
            }
            ListingSection::Transitive => {
                if !seen_transitive.insert(name.clone()) {
                    continue;
                }
                listing.transitive.push(ListedPackage {
                    name,
                    requested: None,
                    resolved,
                });
            }
            ListingSection::None => {}
        }
    }

    listing
}

// =============================================================================
// Restore output
// =============================================================================

/// Parse `dotnet restore` stderr and stdout into diagnostics.
///
/// A line identical to one already reported (in either stream) is skipped.
pub fn parse_restore_output(stderr: &str, stdout: &str) -> Vec<RestoreError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for line in stderr.lines().chain(stdout.lines()) {
        let trimmed = line.trim();
        if trimmed.is_empty() || !is_diagnostic(trimmed) {
            continue;
        }
        if !seen.insert(trimmed.to_string()) {
            continue;
        }
        errors.push(parse_restore_line(trimmed));
    }

    errors
}

fn is_diagnostic(line: &str) -> bool {
    RESTORE_CODES.iter().any(|code| line.contains(code))
        || line.contains("error")
        || line.contains("ERROR")
}

fn parse_restore_line(line: &str) -> RestoreError {
    let kind = if line.to_lowercase().contains("error") {
        RestoreErrorKind::Error
    } else {
        RestoreErrorKind::Warning
    };

    let code = NUGET_CODE
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    let project_path = CSPROJ_PREFIX
        .captures(line)
        .map(|caps| caps[1].trim().to_string());

    let message = match CODE_MESSAGE.captures(line) {
        Some(caps) => caps[1].to_string(),
        None => match CSPROJ_PREFIX.find(line) {
            Some(prefix) => line[prefix.end()..].to_string(),
            None => line.to_string(),
        },
    };
    let message = TRAILING_TARGET.replace(&message, "").trim().to_string();

    RestoreError {
        kind,
        code,
        message,
        project_path,
        full_text: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RestoreErrorCategory;
    use proptest::prelude::*;

    const OUTDATED: &str = "\
The following sources were used:
   https://api.nuget.org/v3/index.json

Project 'Foo' has the following updates to its packages
   [net8.0]:
   Top-level Package      Requested   Resolved   Latest
   > Newtonsoft.Json      1.0.0       9.0.1      13.0.3
";

    #[test]
    fn test_parse_outdated_example() {
        let updates = parse_outdated(OUTDATED, None);
        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.package_name, "Newtonsoft.Json");
        assert_eq!(update.current_version, "9.0.1");
        assert_eq!(update.recommended_version, "13.0.3");
        assert_eq!(update.project_path, "Foo");
        assert!(update.has_breaking_changes);
    }

    #[test]
    fn test_parse_outdated_is_idempotent() {
        assert_eq!(parse_outdated(OUTDATED, None), parse_outdated(OUTDATED, None));
    }

    #[test]
    fn test_expected_project_wins() {
        let updates = parse_outdated(OUTDATED, Some("src/Foo/Foo.csproj"));
        assert_eq!(updates[0].project_path, "src/Foo/Foo.csproj");
    }

    #[test]
    fn test_header_quote_styles() {
        for quote in ['\'', '"', '`'] {
            let text = format!(
                "Project {q}Bar{q} has the following updates to its packages\n > A 1.0 1.0 2.0\n",
                q = quote
            );
            assert_eq!(parse_outdated(&text, None)[0].project_path, "Bar");
        }
    }

    #[test]
    fn test_multiple_projects_and_short_lines() {
        let text = "\
> Orphan 1.0.0 1.0.0 1.1.0
Project `A` has the following updates to its packages
   > Serilog 2.0.0 2.0.0 3.1.1
   > Broken 1.0.0
Project `B` has the following updates to its packages
   > Polly 7.0.0 7.2.4 8.2.0
";
        let updates = parse_outdated(text, None);
        let projects: Vec<_> = updates.iter().map(|u| u.project_path.as_str()).collect();
        let names: Vec<_> = updates.iter().map(|u| u.package_name.as_str()).collect();
        assert_eq!(projects, vec!["", "A", "B"]);
        assert_eq!(names, vec!["Orphan", "Serilog", "Polly"]);
    }

    #[test]
    fn test_parse_outdated_empty() {
        assert!(parse_outdated("", None).is_empty());
    }

    #[test]
    fn test_parse_package_list() {
        let text = "\
Project 'App' has the following package references
   [net6.0]:
   Top-level Package                         Requested   Resolved
   > Microsoft.NETCore.App             (A)   [6.0.0, )   6.0.0
   > Newtonsoft.Json                         13.0.1      13.0.1

   Transitive Package               Resolved
   > System.Runtime                 4.3.0

   [net8.0]:
   Top-level Package      Requested   Resolved
   > Newtonsoft.Json      13.0.3      13.0.3

   Transitive Package               Resolved
   > System.Runtime                 4.3.1
   > System.Memory                  4.5.5
";
        let listing = parse_package_list(text);
        assert_eq!(listing.top_level.len(), 2);
        assert_eq!(
            listing.top_level[0].requested.as_deref(),
            Some("[6.0.0, )")
        );
        assert_eq!(listing.resolved_version("newtonsoft.json"), Some("13.0.1"));
        assert_eq!(listing.transitive.len(), 2);
        assert_eq!(listing.resolved_version("System.Runtime"), Some("4.3.0"));
    }

    #[test]
    fn test_parse_restore_output() {
        let stderr = "\
/src/App/App.csproj : error NU1107: Version conflict detected for Microsoft.Extensions.Logging. [/src/App.sln]
/src/Lib/Lib.csproj : warning NU1608: Detected package version outside of dependency constraint
";
        let stdout = "\
  Determining projects to restore...
/src/App/App.csproj : error NU1107: Version conflict detected for Microsoft.Extensions.Logging. [/src/App.sln]
  Failed to restore /src/App/App.csproj
";
        let errors = parse_restore_output(stderr, stdout);
        assert_eq!(errors.len(), 2);

        let conflict = &errors[0];
        assert!(conflict.is_error());
        assert_eq!(conflict.code, "NU1107");
        assert_eq!(conflict.project_path.as_deref(), Some("/src/App/App.csproj"));
        assert_eq!(
            conflict.message,
            "Version conflict detected for Microsoft.Extensions.Logging."
        );
        assert_eq!(conflict.category(), RestoreErrorCategory::VersionConflict);

        let constraint = &errors[1];
        assert_eq!(constraint.kind, RestoreErrorKind::Warning);
        assert_eq!(constraint.category(), RestoreErrorCategory::DependencyConstraint);
    }

    #[test]
    fn test_restore_error_without_code() {
        let errors = parse_restore_output("error: unable to reach feed", "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "UNKNOWN");
        assert_eq!(errors[0].project_path, None);
        assert_eq!(errors[0].category(), RestoreErrorCategory::Other);
    }

    proptest! {
        #[test]
        fn prop_outdated_lines_round_trip(
            rows in prop::collection::vec(
                ("[A-Z][a-z]{1,8}(\\.[A-Z][a-z]{1,8}){0,2}", "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}", "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}"),
                0..12,
            )
        ) {
            let mut text = String::from("Project 'P' has the following updates to its packages\n");
            for (name, current, latest) in &rows {
                text.push_str(&format!("   > {}  {}  {}  {}\n", name, current, current, latest));
            }
            let first = parse_outdated(&text, None);
            prop_assert_eq!(&first, &parse_outdated(&text, None));
            prop_assert_eq!(first.len(), rows.len());
            for (update, (name, current, latest)) in first.iter().zip(&rows) {
                prop_assert_eq!(&update.package_name, name);
                prop_assert_eq!(&update.current_version, current);
                prop_assert_eq!(&update.recommended_version, latest);
                prop_assert_eq!(update.project_path.as_str(), "P");
            }
        }

        #[test]
        fn prop_restore_parser_never_panics(stderr in ".{0,200}", stdout in ".{0,200}") {
            let errors = parse_restore_output(&stderr, &stdout);
            for error in errors {
                prop_assert!(!error.code.is_empty());
            }
        }
    }
}
