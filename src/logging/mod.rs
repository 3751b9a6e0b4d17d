// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Logging setup
//!
//! Events go to stderr and to a daily file in the log directory. The filter
//! comes from `RUST_LOG` and defaults to `info`.

pub mod cleanup;
pub mod writer;

pub use cleanup::{cleanup_old_logs, CleanupResult, LogRetention};
pub use writer::{log_file_for, DailyLogWriter, LocalTimer};

use std::path::Path;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot create log directory {path}: {source}")]
    LogDir {
        path: String,
        source: std::io::Error,
    },
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber
pub fn init(log_dir: &Path) -> Result<(), LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::LogDir {
        path: log_dir.display().to_string(),
        source,
    })?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTimer)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(DailyLogWriter::new(log_dir))
        .with_timer(LocalTimer)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
