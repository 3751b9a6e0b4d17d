// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod crm;
pub mod feed;
pub mod filter;
pub mod logging;
pub mod reconcile;
pub mod sync;

// Re-export main types
pub use checkpoint::{CheckpointStore, FileCheckpointStore, SequenceId, Watermark};
pub use config::{ConfigError, RuntimePaths, SyncConfig};
pub use crm::{ContactRef, CrmClient, CrmError, SalesforceClient, UpdateOutcome};
pub use feed::{FeedClient, FeedEntry, FeedError, HttpFeedClient};
pub use filter::{filter_entries, FilterOutcome};
pub use reconcile::{reconcile_all, ReconciliationOutcome, ReconciliationReport};
pub use sync::{RunOptions, RunReport, RunState, SyncError, SyncRunner};
