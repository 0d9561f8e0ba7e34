//! # shopper CLI
//!
//! Drives an unattended shopping agent that browses stores on a macOS
//! desktop and writes the options it finds to files.
//!
//! ## Usage
//!
//! - `shopper run --item 3` - Research one item from the shopping brief
//! - `shopper run --task "a field watch under $100"` - Freeform request
//! - `shopper batch --items 1,2,3` - Several items back to back
//! - `shopper tools` - Show available tools

use anyhow::Result;
use clap::{Parser, Subcommand};
use shopper_core::RunStatus;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;
mod logging;
mod prompt;
mod tools;

use commands::{batch_command, run_command, tools_command, BatchArgs, RunArgs};
use config::CliConfigLoader;

/// Directory run logs are written to, under the working directory
const LOG_DIR: &str = "logs";

/// shopper - an unattended computer-use shopping agent
#[derive(Parser)]
#[command(name = "shopper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An unattended computer-use agent that researches purchase options")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key override
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL override
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model name override
    #[arg(long, global = true)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Working directory
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one shopping mission
    Run(RunArgs),

    /// Run several items from the brief one after another
    Batch(BatchArgs),

    /// Show available tools
    Tools {
        /// Display to probe (1-indexed)
        #[arg(short = 'd', long)]
        display: Option<u32>,
    },
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli, working_dir: PathBuf) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new().with_working_dir(working_dir);

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(api_key) = &cli.api_key {
        loader = loader.with_api_key_override(api_key.clone());
    }

    if let Some(base_url) = &cli.base_url {
        loader = loader.with_base_url_override(base_url.clone());
    }

    if let Some(model) = &cli.model {
        loader = loader.with_model_override(model.clone());
    }

    loader
}

/// 0 unless the run failed
fn exit_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Completed | RunStatus::Exhausted => 0,
        RunStatus::Failed => 1,
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Change working directory if specified
    if let Some(working_dir) = &cli.working_dir {
        std::env::set_current_dir(working_dir)?;
    }
    let working_dir = std::env::current_dir()?;
    dotenvy::dotenv().ok();

    let log_dir = match &cli.command {
        Commands::Run(args) if !args.dry_run => Some(working_dir.join(LOG_DIR)),
        Commands::Batch(_) => Some(working_dir.join(LOG_DIR)),
        _ => None,
    };
    logging::init_logging(cli.verbose, log_dir.as_deref())?;

    let config_loader = build_config_loader(&cli, working_dir.clone());

    match cli.command {
        Commands::Run(args) => {
            let status = run_command(args, config_loader, working_dir).await?;
            Ok(ExitCode::from(exit_code(status)))
        }
        Commands::Batch(args) => {
            let status = batch_command(args, config_loader, working_dir).await?;
            Ok(ExitCode::from(exit_code(status)))
        }
        Commands::Tools { display } => {
            tools_command(&working_dir, display).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["shopper", "run", "--raw", "hi", "--model", "m", "-v"]).unwrap();
        assert_eq!(cli.model.as_deref(), Some("m"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(RunStatus::Completed), 0);
        assert_eq!(exit_code(RunStatus::Exhausted), 0);
        assert_eq!(exit_code(RunStatus::Failed), 1);
    }
}
