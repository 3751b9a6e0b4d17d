// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! CRM contact access
//!
//! The sync engine needs three operations from the CRM: log in, find a
//! contact by exact email, and set that contact's email opt-out flag.
//! `authenticate` must succeed before the other two are callable.

pub mod mock;
pub mod salesforce;

pub use mock::MockCrmClient;
pub use salesforce::{SalesforceClient, SalesforceCredentials};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Not authenticated: call authenticate() first")]
    NotAuthenticated,
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl CrmError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CrmError::Auth(_) => "CRM_AUTH",
            CrmError::NotAuthenticated => "CRM_NOT_AUTHENTICATED",
            CrmError::Transport(_) => "CRM_TRANSPORT",
            CrmError::Query(_) => "CRM_QUERY",
            CrmError::InvalidResponse(_) => "CRM_INVALID_RESPONSE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CrmError::Transport(_) | CrmError::Query(_))
    }
}

/// Contact located by email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    pub id: String,
    pub email: String,
    pub opted_out: bool,
}

/// A single error reported by the CRM for a rejected mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmFieldError {
    #[serde(rename = "statusCode", default)]
    pub status_code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Per-record result of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub success: bool,
    pub errors: Vec<CrmFieldError>,
}

impl UpdateOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<CrmFieldError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }

    /// Human-readable description of the reported errors
    pub fn reason(&self) -> String {
        if self.errors.is_empty() {
            return "update rejected without error detail".to_string();
        }
        serde_json::to_string(&self.errors).unwrap_or_else(|_| {
            self.errors
                .iter()
                .map(|e| format!("{}: {}", e.status_code, e.message))
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn authenticate(&mut self) -> Result<(), CrmError>;

    /// First contact whose email equals `email` exactly
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactRef>, CrmError>;

    /// Set the opt-out flag on `contact`. Rejections are reported in the
    /// outcome; only transport-level problems are errors.
    async fn set_opted_out(&self, contact: &ContactRef) -> Result<UpdateOutcome, CrmError>;
}
