// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod checkpoint;
pub mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Opt-out sync CLI
#[derive(Parser, Debug)]
#[command(name = "optout-sync")]
#[command(version)]
#[command(about = "Sync email opt-outs from the event feed into the CRM", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one synchronization pass (default)
    Run(run::RunArgs),

    /// Inspect or repair the stored watermark
    #[command(subcommand)]
    Checkpoint(checkpoint::CheckpointCommands),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        None => run::run_sync(run::RunArgs::default()).await,
        Some(Commands::Run(args)) => run::run_sync(args).await,
        Some(Commands::Checkpoint(command)) => checkpoint::execute(command).await,
    }
}
