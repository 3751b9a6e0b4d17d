// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{info, warn};

use crate::checkpoint::FileCheckpointStore;
use crate::config::{load_env_file, SyncConfig};
use crate::crm::SalesforceClient;
use crate::feed::HttpFeedClient;
use crate::logging::{self, cleanup_old_logs, LogRetention};
use crate::sync::{RunOptions, RunReport, SyncRunner};

pub const DEFAULT_ENV_FILE: &str = ".env";

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Env file to load before reading configuration
    #[arg(long, default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Fetch and filter only; no CRM calls, no checkpoint write
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            dry_run: false,
            json: false,
        }
    }
}

/// Load configuration, set up logging, and run one sync pass
pub async fn run_sync(args: RunArgs) -> Result<()> {
    let env_loaded = load_env_file(&args.env_file)?;
    let config = SyncConfig::from_env()?;

    logging::init(&config.log_dir)?;
    if env_loaded {
        info!("Environment variables loaded from {}", args.env_file.display());
    }

    let retention = LogRetention::new(config.log_retention());
    match cleanup_old_logs(&config.log_dir, &retention, SystemTime::now()) {
        Ok(result) if !result.deleted.is_empty() => {
            info!("Deleted {} expired log files", result.deleted.len())
        }
        Ok(_) => {}
        Err(e) => warn!("Log cleanup skipped: {}", e),
    }

    let store = FileCheckpointStore::new(&config.checkpoint_path);
    let feed = HttpFeedClient::new(&config.feed_url, config.http_timeout)?;
    let mut crm = SalesforceClient::new(config.salesforce.clone(), config.http_timeout)?;

    let report = SyncRunner::new(&store, &feed, &mut crm)
        .with_options(RunOptions {
            dry_run: args.dry_run,
        })
        .run()
        .await;

    print_report(&report, args.json)?;

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "run aborted: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ))
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}
