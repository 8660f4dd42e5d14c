// ABOUTME: Entry point for the slotswap CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use slotswap::config::{self, Config};
use slotswap::error::Result;
use slotswap::output::{Output, OutputMode};
use slotswap::switch::SwitchRequest;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    if let Err(e) = run(cli, &mut output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &mut Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { domain, force } => {
            let path = config::init_config(&cwd, domain.as_deref(), force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(())
        }
        Commands::Switch {
            slot,
            edge,
            no_rollback,
            force_unlock,
        } => {
            let config = Config::discover(cli.config.as_deref(), &cwd)?;
            let request = SwitchRequest {
                selection: slot,
                auto_rollback: config.auto_rollback && !no_rollback,
            };
            commands::switch(config, request, edge.as_deref(), force_unlock, output).await
        }
        Commands::Status { edge } => {
            let config = Config::discover(cli.config.as_deref(), &cwd)?;
            commands::status(config, edge.as_deref(), output).await
        }
    }
}
