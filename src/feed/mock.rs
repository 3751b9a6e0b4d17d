// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use crate::feed::{parse_feed, FeedClient, FeedEntry, FeedError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory feed for tests
#[derive(Debug, Clone, Default)]
pub struct MockFeedClient {
    entries: Arc<Mutex<Vec<FeedEntry>>>,
    injected_error: Arc<Mutex<Option<FeedError>>>,
    fetch_count: Arc<Mutex<usize>>,
}

impl MockFeedClient {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            ..Self::default()
        }
    }

    /// Build from a JSON body, as the HTTP client would receive it
    pub fn from_json(body: &str) -> Result<Self, FeedError> {
        Ok(Self::new(parse_feed(body)?))
    }

    pub async fn set_entries(&self, entries: Vec<FeedEntry>) {
        *self.entries.lock().await = entries;
    }

    /// Fail the next fetch with `error`
    pub async fn inject_error(&self, error: FeedError) {
        *self.injected_error.lock().await = Some(error);
    }

    pub async fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().await
    }
}

#[async_trait]
impl FeedClient for MockFeedClient {
    async fn fetch_all(&self) -> Result<Vec<FeedEntry>, FeedError> {
        *self.fetch_count.lock().await += 1;
        if let Some(error) = self.injected_error.lock().await.take() {
            return Err(error);
        }
        Ok(self.entries.lock().await.clone())
    }
}
