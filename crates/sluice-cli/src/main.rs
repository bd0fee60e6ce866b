//! Sluice CLI - run, check and inspect pipeline files.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about = "Sluice streaming pipeline runner", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file until its blocks finish or it stalls
    Run(commands::run::RunArgs),

    /// Check pipeline files without running them
    Validate(commands::validate::ValidateArgs),

    /// Show the graph and buffers a pipeline file builds
    Describe(commands::describe::DescribeArgs),

    /// List available block types and their parameters
    Blocks(commands::blocks::BlocksArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Validate(args) => commands::validate::run(args),
        Commands::Describe(args) => commands::describe::run(args),
        Commands::Blocks(args) => commands::blocks::run(args),
    }
}
