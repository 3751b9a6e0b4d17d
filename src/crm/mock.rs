// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use crate::crm::{ContactRef, CrmClient, CrmError, CrmFieldError, UpdateOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MockState {
    /// Contacts in insertion order; lookups return the first match
    contacts: Vec<ContactRef>,
    authenticated: bool,
    auth_error: Option<String>,
    rejected_ids: HashMap<String, Vec<CrmFieldError>>,
    query_failures: HashSet<String>,
    queries: Vec<String>,
    updates: Vec<String>,
    /// Updates that actually changed a contact's flag
    effective_updates: usize,
}

/// In-memory CRM for tests
#[derive(Debug, Clone, Default)]
pub struct MockCrmClient {
    state: Arc<Mutex<MockState>>,
}

impl MockCrmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact; returns its generated id
    pub async fn add_contact(&self, email: &str, opted_out: bool) -> String {
        let mut state = self.state.lock().await;
        let id = format!("003MOCK{:08}", state.contacts.len() + 1);
        state.contacts.push(ContactRef {
            id: id.clone(),
            email: email.to_string(),
            opted_out,
        });
        id
    }

    pub async fn contact(&self, email: &str) -> Option<ContactRef> {
        let state = self.state.lock().await;
        state.contacts.iter().find(|c| c.email == email).cloned()
    }

    /// Make `authenticate` fail with `message`
    pub async fn fail_authentication(&self, message: &str) {
        self.state.lock().await.auth_error = Some(message.to_string());
    }

    /// Make updates for contact `id` come back rejected
    pub async fn reject_updates_for(&self, id: &str, errors: Vec<CrmFieldError>) {
        self.state
            .lock()
            .await
            .rejected_ids
            .insert(id.to_string(), errors);
    }

    /// Make lookups for `email` fail at the transport level
    pub async fn fail_queries_for(&self, email: &str) {
        self.state
            .lock()
            .await
            .query_failures
            .insert(email.to_string());
    }

    pub async fn queries(&self) -> Vec<String> {
        self.state.lock().await.queries.clone()
    }

    pub async fn updates(&self) -> Vec<String> {
        self.state.lock().await.updates.clone()
    }

    pub async fn effective_updates(&self) -> usize {
        self.state.lock().await.effective_updates
    }
}

#[async_trait]
impl CrmClient for MockCrmClient {
    async fn authenticate(&mut self) -> Result<(), CrmError> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.auth_error.clone() {
            return Err(CrmError::Auth(message));
        }
        state.authenticated = true;
        Ok(())
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<ContactRef>, CrmError> {
        let mut state = self.state.lock().await;
        if !state.authenticated {
            return Err(CrmError::NotAuthenticated);
        }
        state.queries.push(email.to_string());
        if state.query_failures.contains(email) {
            return Err(CrmError::Transport(format!("connection reset while querying {}", email)));
        }
        Ok(state.contacts.iter().find(|c| c.email == email).cloned())
    }

    async fn set_opted_out(&self, contact: &ContactRef) -> Result<UpdateOutcome, CrmError> {
        let mut state = self.state.lock().await;
        if !state.authenticated {
            return Err(CrmError::NotAuthenticated);
        }
        state.updates.push(contact.id.clone());
        if let Some(errors) = state.rejected_ids.get(&contact.id).cloned() {
            return Ok(UpdateOutcome::rejected(errors));
        }

        let changed = match state.contacts.iter_mut().find(|c| c.id == contact.id) {
            Some(stored) => {
                let was_opted_out = stored.opted_out;
                stored.opted_out = true;
                !was_opted_out
            }
            None => {
                return Ok(UpdateOutcome::rejected(vec![CrmFieldError {
                    status_code: "ENTITY_IS_DELETED".to_string(),
                    message: "entity is deleted".to_string(),
                    fields: Vec::new(),
                }]));
            }
        };
        if changed {
            state.effective_updates += 1;
        }
        Ok(UpdateOutcome::succeeded())
    }
}
