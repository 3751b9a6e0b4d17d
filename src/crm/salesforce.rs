// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Salesforce REST client for Contact opt-out updates
//!
//! - Login: OAuth 2.0 username-password flow
//! - Lookup: SOQL query on `Contact.Email`
//! - Update: sObject collection PATCH, which reports success per record

use crate::crm::{ContactRef, CrmClient, CrmError, CrmFieldError, UpdateOutcome};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";
pub const DEFAULT_API_VERSION: &str = "v59.0";

#[derive(Clone)]
pub struct SalesforceCredentials {
    pub login_url: String,
    pub api_version: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl fmt::Debug for SalesforceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SalesforceCredentials")
            .field("login_url", &self.login_url)
            .field("api_version", &self.api_version)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_token", &"<redacted>")
            .finish()
    }
}

// --- REST serde structs ---

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "totalSize")]
    total_size: u64,
    records: Vec<ContactRecord>,
}

#[derive(Deserialize)]
struct ContactRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Email", default)]
    email: Option<String>,
    #[serde(rename = "HasOptedOutOfEmail", default)]
    has_opted_out_of_email: bool,
}

#[derive(Serialize)]
struct CollectionUpdateRequest {
    #[serde(rename = "allOrNone")]
    all_or_none: bool,
    records: Vec<ContactOptOutRecord>,
}

#[derive(Serialize)]
struct ContactOptOutRecord {
    attributes: RecordAttributes,
    id: String,
    #[serde(rename = "HasOptedOutOfEmail")]
    has_opted_out_of_email: bool,
}

#[derive(Serialize)]
struct RecordAttributes {
    #[serde(rename = "type")]
    object_type: String,
}

#[derive(Deserialize)]
struct SaveResult {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<CrmFieldError>,
}

struct Session {
    access_token: String,
    instance_url: String,
}

/// Salesforce client; holds the session obtained by `authenticate`
pub struct SalesforceClient {
    client: Client,
    credentials: SalesforceCredentials,
    session: Option<Session>,
}

/// Quote `value` as a SOQL string literal
pub fn soql_string_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

/// Map a non-2xx reply to the update request onto a run-stopping error
fn update_status_error(status: StatusCode, body: &str) -> CrmError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CrmError::Auth(detail),
        _ => CrmError::Transport(detail),
    }
}

/// SOQL selecting at most one contact by exact email
pub fn contact_by_email_query(email: &str) -> String {
    format!(
        "SELECT Id, Email, HasOptedOutOfEmail FROM Contact WHERE Email = {} LIMIT 1",
        soql_string_literal(email)
    )
}

impl SalesforceClient {
    pub fn new(credentials: SalesforceCredentials, timeout: Duration) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            credentials,
            session: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Result<&Session, CrmError> {
        self.session.as_ref().ok_or(CrmError::NotAuthenticated)
    }

    fn data_url(&self, session: &Session, path: &str) -> String {
        format!(
            "{}/services/data/{}/{}",
            session.instance_url.trim_end_matches('/'),
            self.credentials.api_version,
            path
        )
    }
}

#[async_trait]
impl CrmClient for SalesforceClient {
    async fn authenticate(&mut self) -> Result<(), CrmError> {
        let creds = &self.credentials;
        let url = format!(
            "{}/services/oauth2/token",
            creds.login_url.trim_end_matches('/')
        );
        // Salesforce expects the security token appended to the password
        let password = format!("{}{}", creds.password, creds.security_token);
        let form = [
            ("grant_type", "password"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("username", creds.username.as_str()),
            ("password", password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(err) => format!("{}: {}", err.error, err.error_description),
                Err(_) => format!("HTTP {}", status.as_u16()),
            };
            return Err(CrmError::Auth(detail));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(e.to_string()))?;

        info!(
            "Salesforce login succeeded: instance={}",
            token.instance_url
        );
        self.session = Some(Session {
            access_token: token.access_token,
            instance_url: token.instance_url,
        });
        Ok(())
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactRef>, CrmError> {
        let session = self.session()?;
        let soql = contact_by_email_query(email);
        debug!("SOQL: {}", soql);

        let response = self
            .client
            .get(self.data_url(session, "query"))
            .bearer_auth(&session.access_token)
            .query(&[("q", soql.as_str())])
            .send()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Query(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| CrmError::InvalidResponse(e.to_string()))?;

        if result.total_size == 0 {
            return Ok(None);
        }

        Ok(result.records.into_iter().next().map(|record| ContactRef {
            id: record.id,
            email: record.email.unwrap_or_else(|| email.to_string()),
            opted_out: record.has_opted_out_of_email,
        }))
    }

    async fn set_opted_out(&self, contact: &ContactRef) -> Result<UpdateOutcome, CrmError> {
        let session = self.session()?;
        let request = CollectionUpdateRequest {
            all_or_none: false,
            records: vec![ContactOptOutRecord {
                attributes: RecordAttributes {
                    object_type: "Contact".to_string(),
                },
                id: contact.id.clone(),
                has_opted_out_of_email: true,
            }],
        };

        let response = self
            .client
            .patch(self.data_url(session, "composite/sobjects"))
            .bearer_auth(&session.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrmError::Transport(e.to_string()))?;

        if !status.is_success() {
            // Nothing was applied; only a per-record result counts as a rejection
            return Err(update_status_error(status, &body));
        }

        let results: Vec<SaveResult> = serde_json::from_str(&body)
            .map_err(|e| CrmError::InvalidResponse(e.to_string()))?;
        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::InvalidResponse("empty save result".to_string()))?;

        Ok(if result.success {
            UpdateOutcome::succeeded()
        } else {
            UpdateOutcome::rejected(result.errors)
        })
    }
}
