use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nuplan::cli::commands;
use nuplan::cli::{CommandContext, OutputFormat};
use nuplan::config::StrategyChoice;

#[derive(Parser)]
#[command(name = "nuplan")]
#[command(version, about = "AI-assisted NuGet package upgrade planner for .NET solutions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project config file (default: .nuplan/config.toml)
    #[arg(long, short, global = true, env = "NUPLAN_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(clap::Args)]
struct Target {
    /// Solution file, project file, or directory containing one
    #[arg(default_value = ".")]
    solution: PathBuf,

    /// Output format: text, json
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,

    /// Never consult the AI oracle
    #[arg(long)]
    no_ai: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List outdated packages per project
    Scan {
        #[command(flatten)]
        target: Target,
    },

    /// Show the dependency graph and detected package families
    Families {
        #[command(flatten)]
        target: Target,
    },

    /// Generate upgrade strategies without changing anything
    Plan {
        #[command(flatten)]
        target: Target,
        #[arg(long, short, help = "family-first, conservative, all-at-once, ai")]
        strategy: Option<StrategyChoice>,
    },

    /// Plan and execute an upgrade
    Upgrade {
        #[command(flatten)]
        target: Target,
        #[arg(long, short, help = "family-first, conservative, all-at-once, ai")]
        strategy: Option<StrategyChoice>,
        #[arg(long = "dry-run", help = "Show the plan only, don't run")]
        dry_run: bool,
    },

    /// Detect and resolve version conflicts across projects
    Conflicts {
        #[command(flatten)]
        target: Target,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mnuplan encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!("\n\x1b[33mNo packages were changed after this point; run 'dotnet restore' to check the solution.\x1b[0m");
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();
    let load = |target: &Target| {
        CommandContext::load(config_path, Some(&target.solution), target.no_ai)
    };

    let rt = Runtime::new()?;
    match cli.command {
        Commands::Scan { target } => {
            let ctx = load(&target)?;
            rt.block_on(commands::scan::run(&ctx, target.format))?;
        }
        Commands::Families { target } => {
            let ctx = load(&target)?;
            rt.block_on(commands::families::run(&ctx, target.format))?;
        }
        Commands::Plan { target, strategy } => {
            let ctx = load(&target)?;
            rt.block_on(commands::plan::run(&ctx, strategy, target.format))?;
        }
        Commands::Upgrade {
            target,
            strategy,
            dry_run,
        } => {
            let ctx = load(&target)?;
            rt.block_on(commands::upgrade::run(&ctx, strategy, dry_run, target.format))?;
        }
        Commands::Conflicts { target } => {
            let ctx = load(&target)?;
            rt.block_on(commands::conflicts::run(&ctx, target.format))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(config_path, global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path(config_path)?;
            }
            ConfigAction::Init { global, force } => {
                commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
