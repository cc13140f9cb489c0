//! Upgrade Command
//!
//! Plan and execute an upgrade. Ctrl-C stops after the current package;
//! restore still runs for whatever was already changed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use super::conflicts::print_analysis;
use super::plan::print_plan;
use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::config::StrategyChoice;
use crate::types::{ExecutionReport, RestoreErrorCategory, Result};

pub async fn run(
    ctx: &CommandContext,
    strategy: Option<StrategyChoice>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let choice = strategy.unwrap_or(ctx.config.upgrade.strategy);

    let cancel = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&cancel);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current package");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    let outcome = ctx
        .workflow()
        .with_cancel_flag(cancel)
        .run(&ctx.solution_path, choice, dry_run)
        .await;
    watcher.abort();
    let outcome = outcome?;

    if format.is_json() {
        return print_json(&outcome);
    }

    let out = Output::new();
    print_plan(&out, &outcome.plan);
    match &outcome.report {
        None => out.info("Dry run: no packages were changed"),
        Some(report) => print_report(&out, report),
    }
    for analysis in &outcome.conflict_analyses {
        print_analysis(&out, analysis);
    }
    if let Some(error) = &outcome.conflict_error {
        out.warning(&format!("Could not explain restore conflicts: {}", error));
    }
    Ok(())
}

fn print_report(out: &Output, report: &ExecutionReport) {
    out.header(&format!("Execution: {}", report.strategy_name));
    out.key_value("Run", report.run_id.as_str());
    out.key_value("State", &report.final_state.to_string());

    for result in &report.results {
        let line = format!(
            "{} {} -> {} ({})",
            result.package_name, result.from_version, result.to_version, result.project_path
        );
        match &result.error {
            None => out.success(&line),
            Some(error) => {
                out.error(&line);
                out.detail(error);
            }
        }
    }

    if report.cancelled {
        out.warning("Cancelled before all updates ran");
    }

    if !report.restore_errors.is_empty() {
        out.section("Restore diagnostics");
        let mut categories: BTreeMap<String, RestoreErrorCategory> = BTreeMap::new();
        for error in &report.restore_errors {
            println!(
                "  {} {}: {}",
                out.restore_kind(error.kind),
                error.code,
                error.message
            );
            if let Some(project) = &error.project_path {
                out.detail(project);
            }
            categories.insert(error.category().to_string(), error.category());
        }
        for category in categories.values() {
            out.info(&format!("{}: {}", category, category.guidance()));
        }
    }

    println!();
    if report.failed() > 0 || report.restore_errors.iter().any(|e| e.is_error()) {
        out.warning(&report.summary());
    } else {
        out.success(&report.summary());
    }
}
