//! Conflicts Command
//!
//! Detect version conflicts across projects and recommend a resolution for
//! each one.

use serde_json::json;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::types::{Result, VersionConflictAnalysis};

pub async fn run(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
    let (graph, analyses) = ctx.workflow().analyze_conflicts(&ctx.solution_path).await?;

    if format.is_json() {
        return print_json(&json!({
            "conflicts": graph.conflicts,
            "analyses": analyses,
        }));
    }

    let out = Output::new();
    out.header(&format!("Version conflicts: {}", ctx.solution_path.display()));
    if graph.conflicts.is_empty() {
        out.success("Every project uses the same version of each package");
        return Ok(());
    }

    for conflict in &graph.conflicts {
        println!(
            "\n{} [{}]",
            conflict.package_name,
            out.severity(conflict.severity)
        );
        for version in &conflict.conflicting_versions {
            out.item(&format!("{} in {}", version.version, version.required_by.join(", ")));
        }
        if let Some(highest) = conflict.highest_version() {
            out.detail(&format!("highest in use: {}", highest));
        }
    }
    for analysis in &analyses {
        print_analysis(&out, analysis);
    }
    Ok(())
}

pub(crate) fn print_analysis(out: &Output, analysis: &VersionConflictAnalysis) {
    out.section(&format!(
        "{}: use {}",
        analysis.package_name, analysis.recommended_version
    ));
    out.key_value("Current", &analysis.current_versions.join(", "));
    out.detail(&analysis.reasoning);

    for (title, lines) in [
        ("Migration", &analysis.migration_steps),
        ("Breaking changes", &analysis.breaking_changes),
        ("Compatibility", &analysis.compatibility_notes),
        ("Test impact", &analysis.test_impact),
    ] {
        if lines.is_empty() {
            continue;
        }
        println!("  {}", title);
        for line in lines {
            out.item(line);
        }
    }
}
