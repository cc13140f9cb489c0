//! Families Command
//!
//! Show the dependency graph summary and detected package families.

use std::sync::Arc;

use crate::analysis::DependencyGraphBuilder;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::types::Result;

pub async fn run(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
    let builder = DependencyGraphBuilder::new(
        Arc::clone(&ctx.package_manager),
        &ctx.config,
        ctx.oracle.clone(),
    )?;
    let graph = builder.analyze_solution_dependencies(&ctx.solution_path).await?;

    if format.is_json() {
        return print_json(&graph);
    }

    let out = Output::new();
    out.header(&format!("Package families: {}", ctx.solution_path.display()));
    out.key_value("Packages", &graph.packages.len().to_string());
    out.key_value("Direct", &graph.direct_count().to_string());
    out.key_value("Families", &graph.package_families.len().to_string());
    out.key_value("Conflicts", &graph.conflicts.len().to_string());

    if !graph.has_families() {
        out.info("No package families detected");
    }
    for family in &graph.package_families {
        out.section(&format!(
            "{} ({}, {:.2}, {:?})",
            family.name, family.detection_method, family.confidence, family.update_strategy
        ));
        for package in &family.packages {
            out.item(package);
        }
        if let Some(reasoning) = &family.characteristics.reasoning {
            out.detail(reasoning);
        }
    }

    if !graph.critical_paths.is_empty() {
        out.section("Critical paths");
        for path in &graph.critical_paths {
            out.item(&path.join(" → "));
        }
    }
    Ok(())
}
