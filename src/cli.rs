// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use slotswap::types::SlotSelection;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slotswap")]
#[command(about = "Zero-downtime blue/green slot switching behind a Caddy edge")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: discovered from the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// JSON lines output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new slotswap.yml configuration file
    Init {
        /// Public domain to route
        #[arg(short, long)]
        domain: Option<String>,

        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Bring up the idle slot and switch traffic to it
    Switch {
        /// Slot to deploy: auto, blue or green
        #[arg(short, long, default_value = "auto")]
        slot: SlotSelection,

        /// Edge container name or systemd unit (default: detected)
        #[arg(short, long)]
        edge: Option<String>,

        /// Leave a failed switch in place instead of rolling back
        #[arg(long)]
        no_rollback: bool,

        /// Break an existing switch lock
        #[arg(long)]
        force_unlock: bool,
    },

    /// Show the edge, the active slot and both slots' health
    Status {
        /// Edge container name or systemd unit (default: detected)
        #[arg(short, long)]
        edge: Option<String>,
    },
}
