//! Solution and project file extraction
//!
//! Both formats are read-only here and only regex-extracted; the package
//! manager is the sole writer.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::types::{NuplanError, Result};

// Project("{FAE04EC0-...}") = "App", "src\App\App.csproj", "{GUID}"
static SOLUTION_PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*Project\("\{[^}]+\}"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]+\.csproj)"\s*,"#)
        .expect("solution project regex")
});

static PACKAGE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<PackageReference\b([^>]*?)(/>|>(.*?)</PackageReference>)")
        .expect("package reference regex")
});

static INCLUDE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bInclude\s*=\s*"([^"]+)""#).expect("include regex"));

static VERSION_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bVersion\s*=\s*"([^"]+)""#).expect("version regex"));

static VERSION_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Version>\s*([^<\s]+)\s*</Version>").expect("version element regex"));

/// A project referenced from a solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    pub path: PathBuf,
}

/// Projects listed in a `.sln`, resolved against the solution directory.
///
/// A `.csproj` path is treated as a solution containing only itself.
pub fn solution_projects(solution_path: &Path) -> Result<Vec<SolutionProject>> {
    if is_project_file(solution_path) {
        let name = solution_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![SolutionProject {
            name,
            path: solution_path.to_path_buf(),
        }]);
    }

    if !solution_path.is_file() {
        return Err(NuplanError::SolutionNotFound(
            solution_path.display().to_string(),
        ));
    }

    let content = std::fs::read_to_string(solution_path)?;
    let base = solution_path.parent().unwrap_or_else(|| Path::new("."));
    let projects = parse_solution(&content)
        .into_iter()
        .map(|(name, relative)| SolutionProject {
            name,
            path: base.join(relative),
        })
        .collect::<Vec<_>>();

    debug!(
        "Solution {} lists {} projects",
        solution_path.display(),
        projects.len()
    );
    Ok(projects)
}

/// `(name, relative path)` pairs with backslashes normalised
pub fn parse_solution(content: &str) -> Vec<(String, String)> {
    SOLUTION_PROJECT
        .captures_iter(content)
        .map(|caps| (caps[1].to_string(), caps[2].replace('\\', "/")))
        .collect()
}

/// Direct `PackageReference` entries as `name -> version`.
///
/// Attribute order does not matter and a nested `<Version>` element is
/// accepted. References without any version (central package management)
/// map to an empty string.
pub fn parse_package_references(content: &str) -> BTreeMap<String, String> {
    let mut references = BTreeMap::new();

    for caps in PACKAGE_REFERENCE.captures_iter(content) {
        let attrs = &caps[1];
        let Some(name) = INCLUDE_ATTR.captures(attrs).map(|c| c[1].to_string()) else {
            continue;
        };
        let version = VERSION_ATTR
            .captures(attrs)
            .or_else(|| caps.get(3).and_then(|body| VERSION_ELEMENT.captures(body.as_str())))
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        references.entry(name).or_insert(version);
    }

    references
}

pub fn read_package_references(project_path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(project_path)?;
    Ok(parse_package_references(&content))
}

pub fn is_project_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csproj"))
}

/// Locate the solution to work on: the path itself when it is a file,
/// otherwise the single `.sln` (or else `.csproj`) inside the directory.
pub fn find_solution(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    for pattern in ["*.sln", "*.csproj"] {
        let full = path.join(pattern);
        let mut matches: Vec<PathBuf> = glob::glob(&full.to_string_lossy())
            .map_err(|e| NuplanError::Config(format!("Invalid search pattern: {}", e)))?
            .filter_map(|entry| entry.ok())
            .collect();
        matches.sort();
        match matches.len() {
            0 => continue,
            1 => return Ok(matches.remove(0)),
            _ => {
                return Err(NuplanError::SolutionNotFound(format!(
                    "{} contains {} {} files; pass one explicitly",
                    path.display(),
                    matches.len(),
                    pattern.trim_start_matches("*.")
                )));
            }
        }
    }

    Err(NuplanError::SolutionNotFound(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Lib", "src/Lib/Lib.csproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
"#;

    #[test]
    fn test_parse_solution_skips_folders() {
        let projects = parse_solution(SOLUTION);
        assert_eq!(
            projects,
            vec![
                ("App".to_string(), "src/App/App.csproj".to_string()),
                ("Lib".to_string(), "src/Lib/Lib.csproj".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_package_references_attribute_order() {
        let project = r#"
<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.1" />
    <PackageReference Version="8.0.0" Include="Microsoft.Extensions.Logging" />
    <PackageReference Include="Serilog">
      <Version>3.1.1</Version>
    </PackageReference>
    <PackageReference Include="Central.Managed" />
  </ItemGroup>
</Project>
"#;
        let refs = parse_package_references(project);
        assert_eq!(refs.len(), 4);
        assert_eq!(refs["Newtonsoft.Json"], "13.0.1");
        assert_eq!(refs["Microsoft.Extensions.Logging"], "8.0.0");
        assert_eq!(refs["Serilog"], "3.1.1");
        assert_eq!(refs["Central.Managed"], "");
    }

    #[test]
    fn test_solution_projects_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let sln = dir.path().join("All.sln");
        std::fs::write(&sln, SOLUTION).unwrap();

        let projects = solution_projects(&sln).unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].path, dir.path().join("src/App/App.csproj"));
    }

    #[test]
    fn test_csproj_is_single_project_solution() {
        let projects = solution_projects(Path::new("src/App/App.csproj")).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "App");
    }

    #[test]
    fn test_missing_solution() {
        let err = solution_projects(Path::new("/nonexistent/All.sln")).unwrap_err();
        assert!(matches!(err, NuplanError::SolutionNotFound(_)));
    }

    #[test]
    fn test_find_solution_in_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("App.csproj"), "<Project />").unwrap();
        std::fs::write(dir.path().join("All.sln"), SOLUTION).unwrap();
        assert_eq!(
            find_solution(dir.path()).unwrap(),
            dir.path().join("All.sln")
        );
    }

    #[test]
    fn test_find_solution_ambiguous() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("A.sln"), "").unwrap();
        std::fs::write(dir.path().join("B.sln"), "").unwrap();
        assert!(find_solution(dir.path()).is_err());
    }
}
