mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "setup-release")]
#[command(author, version, about = "Install a prebuilt release binary for the current runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a release binary and put it on PATH
    Install(commands::InstallArgs),

    /// Show or clean the local tool cache
    Cache {
        /// Remove all cached entries
        #[arg(long)]
        clean: bool,

        /// Cache directory (defaults to $RUNNER_TOOL_CACHE/setup-release)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries outputs outside of a runner
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install(args) => commands::install(args).await,
        Commands::Cache { clean, cache_dir } => commands::cache(clean, cache_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}
