//! Plan Command
//!
//! Generate upgrade strategies without changing anything.

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat, print_json};
use crate::config::StrategyChoice;
use crate::types::{Result, UpgradeStrategy};
use crate::upgrade::UpgradePlan;

pub async fn run(
    ctx: &CommandContext,
    strategy: Option<StrategyChoice>,
    format: OutputFormat,
) -> Result<()> {
    let choice = strategy.unwrap_or(ctx.config.upgrade.strategy);
    let plan = ctx.workflow().plan(&ctx.solution_path, choice).await?;

    if format.is_json() {
        return print_json(&plan);
    }
    print_plan(&Output::new(), &plan);
    Ok(())
}

pub(crate) fn print_plan(out: &Output, plan: &UpgradePlan) {
    out.header(&format!("Upgrade plan: {}", plan.solution_path.display()));
    out.key_value("Updates", &plan.total_updates().to_string());
    if plan.graph.is_none() {
        out.warning("Dependency analysis unavailable; families were not used");
    }

    for strategy in &plan.strategies {
        print_summary(out, strategy);
    }

    out.section(&format!("Selected: {}", plan.selected.name));
    print_phases(out, &plan.selected);
    if let Some(recommendation) = &plan.selected.ai_recommendation {
        out.detail(recommendation);
    }
}

fn print_summary(out: &Output, strategy: &UpgradeStrategy) {
    println!(
        "\n{} - {} phases, risk {}, {}",
        strategy.name,
        strategy.phases.len(),
        out.risk(strategy.estimated_risk),
        strategy.estimated_time
    );
    for pro in &strategy.pros {
        out.detail(&format!("+ {}", pro));
    }
    for con in &strategy.cons {
        out.detail(&format!("- {}", con));
    }
}

fn print_phases(out: &Output, strategy: &UpgradeStrategy) {
    if strategy.is_empty() {
        out.success("No updates needed");
        return;
    }
    for phase in strategy.ordered_phases() {
        println!("\n  {}. {}", phase.order, phase.name);
        for update in &phase.package_updates {
            out.item(&update.label());
        }
        out.detail(&phase.rationale);
    }
}
