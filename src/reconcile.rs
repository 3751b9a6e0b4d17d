// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Reconciler
//!
//! Applies the opt-out flag to the CRM contact matching each candidate email.
//! Emails are handled one at a time, in order; duplicates each get their own
//! lookup and update. Setting the flag is idempotent, so re-running over
//! already-processed emails is harmless.

use crate::crm::{CrmClient, CrmError};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

/// Result of reconciling a single email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    Success,
    Failed(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailOutcome {
    pub email: String,
    pub outcome: ReconciliationOutcome,
}

/// Aggregate counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationCounts {
    pub success: usize,
    pub failed: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub outcomes: Vec<EmailOutcome>,
}

impl ReconciliationReport {
    pub fn record(&mut self, email: &str, outcome: ReconciliationOutcome) {
        self.outcomes.push(EmailOutcome {
            email: email.to_string(),
            outcome,
        });
    }

    pub fn counts(&self) -> ReconciliationCounts {
        let mut counts = ReconciliationCounts::default();
        for entry in &self.outcomes {
            match entry.outcome {
                ReconciliationOutcome::Success => counts.success += 1,
                ReconciliationOutcome::Failed(_) => counts.failed += 1,
                ReconciliationOutcome::NotFound => counts.not_found += 1,
            }
        }
        counts
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Reconciliation stopped before every candidate was attempted
#[derive(Debug, Error)]
#[error("Reconciliation interrupted at {email} after {attempted} of {total} emails: {source}")]
pub struct ReconcileError {
    pub email: String,
    pub attempted: usize,
    pub total: usize,
    pub partial: ReconciliationReport,
    #[source]
    pub source: CrmError,
}

/// Look up and opt out a single email
pub async fn reconcile_email<C: CrmClient + ?Sized>(
    crm: &C,
    email: &str,
) -> Result<ReconciliationOutcome, CrmError> {
    info!("Processing email: {}", email);

    let Some(contact) = crm.find_contact_by_email(email).await? else {
        warn!("Contact not found for email: {}", email);
        return Ok(ReconciliationOutcome::NotFound);
    };

    info!(
        "Contact found for email {}: id={} opted_out={}",
        email, contact.id, contact.opted_out
    );

    let outcome = crm.set_opted_out(&contact).await?;
    if outcome.success {
        info!("Email opt-out succeeded for: {}", email);
        Ok(ReconciliationOutcome::Success)
    } else {
        let reason = outcome.reason();
        error!("Email opt-out failed for: {}. Reason: {}", email, reason);
        Ok(ReconciliationOutcome::Failed(reason))
    }
}

/// Reconcile every email in order.
///
/// CRM rejections are recorded per email. Transport or query errors stop the
/// pass and are returned together with the outcomes gathered so far.
pub async fn reconcile_all<C: CrmClient + ?Sized>(
    crm: &C,
    emails: &[String],
) -> Result<ReconciliationReport, ReconcileError> {
    let mut report = ReconciliationReport::default();

    for email in emails {
        match reconcile_email(crm, email).await {
            Ok(outcome) => report.record(email, outcome),
            Err(source) => {
                error!("Reconciliation interrupted at {}: {}", email, source);
                return Err(ReconcileError {
                    email: email.clone(),
                    attempted: report.attempted(),
                    total: emails.len(),
                    partial: report,
                    source,
                });
            }
        }
    }

    let counts = report.counts();
    info!(
        "Processing finished. Success: {}, Failed: {}, Not found: {}",
        counts.success, counts.failed, counts.not_found
    );
    Ok(report)
}
