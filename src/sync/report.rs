// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use crate::checkpoint::Watermark;
use crate::filter::FilterOutcome;
use crate::reconcile::{EmailOutcome, ReconciliationReport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    WatermarkLoaded,
    FeedFetched,
    Filtered,
    Reconciled,
    Checkpointed,
    Aborted,
}

/// Aggregate counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub success: usize,
    pub failed: usize,
    pub not_found: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub final_state: RunState,
    pub previous_watermark: String,
    #[serde(serialize_with = "serialize_watermark")]
    pub new_watermark: Watermark,
    pub watermark_persisted: bool,
    pub new_entries: usize,
    pub candidates: usize,
    pub counts: RunCounts,
    pub outcomes: Vec<EmailOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn serialize_watermark<S: serde::Serializer>(w: &Watermark, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(w)
}

impl RunReport {
    pub fn new(previous: Watermark) -> Self {
        Self {
            final_state: RunState::Idle,
            previous_watermark: previous.to_string(),
            new_watermark: previous,
            watermark_persisted: false,
            new_entries: 0,
            candidates: 0,
            counts: RunCounts::default(),
            outcomes: Vec::new(),
            error: None,
        }
    }

    pub fn apply_filter(&mut self, filtered: &FilterOutcome) {
        self.new_watermark = filtered.new_watermark.clone();
        self.new_entries = filtered.new_entries;
        self.candidates = filtered.emails.len();
        self.counts.skipped_invalid = filtered.skipped_invalid;
    }

    pub fn apply_reconciliation(&mut self, reconciliation: &ReconciliationReport) {
        let counts = reconciliation.counts();
        self.counts.success = counts.success;
        self.counts.failed = counts.failed;
        self.counts.not_found = counts.not_found;
        self.outcomes = reconciliation.outcomes.clone();
    }

    pub fn is_success(&self) -> bool {
        self.final_state != RunState::Aborted
    }

    /// One-line summary for text output
    pub fn summary(&self) -> String {
        if self.final_state == RunState::Checkpointed && self.new_entries == 0 {
            return format!(
                "state={:?} no new entries, watermark {} unchanged, nothing written",
                self.final_state, self.previous_watermark
            );
        }
        format!(
            "state={:?} watermark={} -> {} persisted={} success={} failed={} notFound={} skippedInvalid={}",
            self.final_state,
            self.previous_watermark,
            self.new_watermark,
            self.watermark_persisted,
            self.counts.success,
            self.counts.failed,
            self.counts.not_found,
            self.counts.skipped_invalid
        )
    }
}
