// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Email-event feed access
//!
//! The feed is a JSON array of entries, each entry itself an array whose
//! first element is the sequence id and whose second element is the
//! recipient email: `[[3, "a@x.com"], [6, "b@x.com"], [7, null]]`.

pub mod entry;
pub mod http_client;
pub mod mock;

pub use entry::{parse_feed, FeedEntry};
pub use http_client::HttpFeedClient;
pub use mock::MockFeedClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Feed returned HTTP {status}")]
    HttpStatus { status: u16 },
    #[error("Malformed feed response: {0}")]
    Malformed(String),
}

impl FeedError {
    pub fn error_code(&self) -> &'static str {
        match self {
            FeedError::Network(_) => "FEED_NETWORK",
            FeedError::HttpStatus { .. } => "FEED_HTTP_STATUS",
            FeedError::Malformed(_) => "FEED_MALFORMED",
        }
    }

    /// Whether a later run can be expected to succeed without intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Network(_) => true,
            FeedError::HttpStatus { status } => *status >= 500 || *status == 429,
            FeedError::Malformed(_) => false,
        }
    }
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch every entry currently available, in feed order
    async fn fetch_all(&self) -> Result<Vec<FeedEntry>, FeedError>;
}
