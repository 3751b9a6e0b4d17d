// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP feed client

use crate::feed::{parse_feed, FeedClient, FeedEntry, FeedError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Fetches the feed with a single `GET` to a fixed URL
pub struct HttpFeedClient {
    client: Client,
    url: String,
}

impl HttpFeedClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Network(e.to_string()))?;

        info!("Feed client configured: url={}", url);

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_all(&self) -> Result<Vec<FeedEntry>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;
        debug!("Feed response: {} bytes", body.len());

        let entries = parse_feed(&body)?;
        info!("Fetched {} feed entries", entries.len());
        Ok(entries)
    }
}
