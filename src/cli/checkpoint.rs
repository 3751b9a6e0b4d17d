// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, SequenceId, Watermark};
use crate::cli::run::DEFAULT_ENV_FILE;
use crate::config::{load_env_file, RuntimePaths};

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Print the stored watermark
    Show(ShowArgs),

    /// Overwrite the stored watermark (may move it backwards)
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// New last-processed sequence id
    pub id: String,

    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,
}

pub async fn execute(command: CheckpointCommands) -> Result<()> {
    match command {
        CheckpointCommands::Show(args) => show(args).await,
        CheckpointCommands::Set(args) => set(args).await,
    }
}

fn store_for(env_file: &Path) -> Result<FileCheckpointStore> {
    load_env_file(env_file)?;
    let paths = RuntimePaths::from_env();
    Ok(FileCheckpointStore::new(paths.checkpoint_path))
}

async fn show(args: ShowArgs) -> Result<()> {
    let store = store_for(&args.env_file)?;
    let watermark = store.load().await;
    println!("{}\t{}", store.path().display(), watermark);
    Ok(())
}

async fn set(args: SetArgs) -> Result<()> {
    let id = SequenceId::parse(args.id.trim())
        .ok_or_else(|| anyhow!("sequence id must not be empty"))?;
    let store = store_for(&args.env_file)?;
    let previous = store.load().await;
    let next = Watermark::At(id);
    store.overwrite(&next).await?;
    println!("{}\t{} -> {}", store.path().display(), previous, next);
    Ok(())
}
