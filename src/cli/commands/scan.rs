//! Scan Command
//!
//! List outdated packages per project.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::types::Result;

pub async fn run(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
    let updates = ctx.workflow().discover(&ctx.solution_path).await?;

    if format.is_json() {
        return print_json(&updates);
    }

    let out = Output::new();
    out.header(&format!("Outdated packages: {}", ctx.solution_path.display()));
    if updates.is_empty() {
        out.success("Everything is up to date");
        return Ok(());
    }

    let mut total = 0;
    let mut breaking = 0;
    for (project, list) in &updates {
        let name = Path::new(project)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| project.clone());
        out.section(&name);
        for update in list {
            let marker = if update.has_breaking_changes { " (major)" } else { "" };
            out.item(&format!("{}{}", update.label(), marker));
        }
        total += list.len();
        breaking += list.iter().filter(|u| u.has_breaking_changes).count();
    }

    println!();
    out.info(&format!(
        "{} outdated packages in {} projects, {} major upgrades",
        total,
        updates.len(),
        breaking
    ));
    Ok(())
}
