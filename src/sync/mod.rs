// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Run Coordinator
//!
//! Drives one synchronization run:
//!
//! `Idle → WatermarkLoaded → FeedFetched → Filtered → Reconciled → Checkpointed`
//!
//! Any failure before the checkpoint write ends in `Aborted` with the stored
//! watermark untouched, so the next run retries the same entries.
//!
//! ## Checkpoint policy
//! - No new entries: nothing is written.
//! - New entries but no valid candidate: the CRM is not contacted and the
//!   advanced watermark is written, so invalid entries are not re-read forever.
//! - Candidates present: the watermark is written once every candidate has
//!   been attempted, whatever the per-email outcomes.

pub mod report;

pub use report::{RunCounts, RunReport, RunState};

use crate::checkpoint::{CheckpointError, CheckpointStore, Watermark};
use crate::crm::{CrmClient, CrmError};
use crate::feed::{FeedClient, FeedError};
use crate::filter::{filter_entries, FilterOutcome};
use crate::reconcile::{reconcile_all, ReconcileError};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Feed fetch failed: {0}")]
    Feed(#[from] FeedError),
    #[error("CRM login failed: {0}")]
    Auth(CrmError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("Checkpoint save failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl SyncError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Feed(e) => e.error_code(),
            SyncError::Auth(e) => e.error_code(),
            SyncError::Reconcile(e) => e.source.error_code(),
            SyncError::Checkpoint(e) => e.error_code(),
        }
    }

    /// State the run was in when it failed
    pub fn failed_in(&self) -> RunState {
        match self {
            SyncError::Feed(_) => RunState::WatermarkLoaded,
            SyncError::Auth(_) | SyncError::Reconcile(_) => RunState::Filtered,
            SyncError::Checkpoint(_) => RunState::Reconciled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Stop after filtering: no CRM calls, no checkpoint write
    pub dry_run: bool,
}

/// Coordinates one run over its collaborators
pub struct SyncRunner<'a> {
    checkpoint: &'a dyn CheckpointStore,
    feed: &'a dyn FeedClient,
    crm: &'a mut dyn CrmClient,
    options: RunOptions,
    state: RunState,
}

impl<'a> SyncRunner<'a> {
    pub fn new(
        checkpoint: &'a dyn CheckpointStore,
        feed: &'a dyn FeedClient,
        crm: &'a mut dyn CrmClient,
    ) -> Self {
        Self {
            checkpoint,
            feed,
            crm,
            options: RunOptions::default(),
            state: RunState::Idle,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!("Run state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Execute the run. Never panics on collaborator failures; the returned
    /// report's `final_state` says whether it completed.
    pub async fn run(mut self) -> RunReport {
        let previous = self.checkpoint.load().await;
        self.transition(RunState::WatermarkLoaded);
        info!("Last processed id: {}", previous);

        let mut report = RunReport::new(previous.clone());
        match self.execute(&previous, &mut report).await {
            Ok(final_state) => {
                self.transition(final_state);
                report.final_state = final_state;
            }
            Err(e) => {
                error!(code = e.error_code(), "Run aborted in {:?}: {}", self.state, e);
                self.transition(RunState::Aborted);
                report.final_state = RunState::Aborted;
                report.error = Some(e.to_string());
            }
        }
        report
    }

    async fn execute(
        &mut self,
        previous: &Watermark,
        report: &mut RunReport,
    ) -> Result<RunState, SyncError> {
        let entries = self.feed.fetch_all().await?;
        self.transition(RunState::FeedFetched);
        info!("Data fetched from feed: {} entries", entries.len());

        let filtered: FilterOutcome = filter_entries(&entries, previous);
        self.transition(RunState::Filtered);
        report.apply_filter(&filtered);

        if !filtered.has_new_entries() {
            info!("No new entries to process");
            return Ok(RunState::Checkpointed);
        }

        if self.options.dry_run {
            for email in &filtered.emails {
                info!("[dry-run] would opt out: {}", email);
            }
            info!(
                "[dry-run] watermark would advance {} -> {}",
                previous, filtered.new_watermark
            );
            return Ok(RunState::Filtered);
        }

        if filtered.has_candidates() {
            self.crm.authenticate().await.map_err(SyncError::Auth)?;
            info!("CRM login succeeded");

            let reconciliation = match reconcile_all(&*self.crm, &filtered.emails).await {
                Ok(reconciliation) => reconciliation,
                Err(e) => {
                    report.apply_reconciliation(&e.partial);
                    return Err(e.into());
                }
            };
            report.apply_reconciliation(&reconciliation);
            self.transition(RunState::Reconciled);
        } else {
            warn!(
                "All {} new entries were invalid; advancing watermark without CRM calls",
                filtered.new_entries
            );
        }

        self.checkpoint.save(&filtered.new_watermark).await?;
        report.watermark_persisted = true;
        info!("Last processed id saved: {}", filtered.new_watermark);

        Ok(RunState::Checkpointed)
    }
}
