// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Entry Filter
//!
//! Selects feed entries newer than the stored watermark and turns them into
//! reconciliation candidates.
//!
//! Every new entry advances the watermark, including entries whose recipient
//! is missing or invalid: they have been seen and must not be picked up again.
//! The new watermark is the maximum id observed, so feed order does not matter
//! for correctness.

pub mod email;

pub use email::is_valid_email;

use crate::checkpoint::Watermark;
use crate::feed::FeedEntry;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of filtering one feed snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Valid recipient addresses, in feed order, duplicates kept
    pub emails: Vec<String>,
    /// Watermark after considering every new entry
    pub new_watermark: Watermark,
    /// Number of entries strictly newer than the input watermark
    pub new_entries: usize,
    /// New entries dropped because the recipient was missing or invalid
    pub skipped_invalid: usize,
    /// Entries at or below the input watermark
    pub already_processed: usize,
}

impl FilterOutcome {
    pub fn has_new_entries(&self) -> bool {
        self.new_entries > 0
    }

    pub fn has_candidates(&self) -> bool {
        !self.emails.is_empty()
    }
}

#[derive(Serialize)]
struct InvalidEntryView<'a> {
    id: serde_json::Value,
    email: Option<&'a str>,
}

/// Filter `entries` against `watermark`.
pub fn filter_entries(entries: &[FeedEntry], watermark: &Watermark) -> FilterOutcome {
    let mut outcome = FilterOutcome {
        emails: Vec::new(),
        new_watermark: watermark.clone(),
        new_entries: 0,
        skipped_invalid: 0,
        already_processed: 0,
    };

    for entry in entries {
        if !watermark.admits(&entry.sequence_id) {
            outcome.already_processed += 1;
            continue;
        }
        outcome.new_entries += 1;

        match entry.recipient_email.as_deref() {
            Some(address) if is_valid_email(address) => {
                info!(id = %entry.sequence_id, "New email to process: {}", address);
                outcome.emails.push(address.to_string());
            }
            raw => {
                let view = InvalidEntryView {
                    id: entry.sequence_id.to_json(),
                    email: raw,
                };
                warn!(
                    "Invalid or missing email in entry: {}",
                    serde_json::to_string(&view).unwrap_or_default()
                );
                outcome.skipped_invalid += 1;
            }
        }

        outcome.new_watermark.advance(&entry.sequence_id);
    }

    debug!(
        "Filtered feed: {} new, {} already processed",
        outcome.new_entries, outcome.already_processed
    );
    info!("Number of new emails to process: {}", outcome.emails.len());

    outcome
}
