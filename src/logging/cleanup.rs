// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Log Retention Policy
//!
//! Deletes `*.log` files in the log directory whose last modification is
//! older than the retention period (30 days by default). Other files are
//! never touched.

use crate::logging::writer::LOG_FILE_EXTENSION;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Default retention (30 days)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct LogRetention {
    pub max_age: Duration,
}

impl Default for LogRetention {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_RETENTION,
        }
    }
}

impl LogRetention {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Check if a file of the given age should be deleted
    pub fn should_cleanup(&self, age: Duration) -> bool {
        age >= self.max_age
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub deleted: Vec<PathBuf>,
    pub retained: usize,
    pub failed: usize,
}

fn is_log_file(path: &Path) -> bool {
    path.is_file() && path.extension().map(|e| e == LOG_FILE_EXTENSION).unwrap_or(false)
}

/// Delete expired log files under `dir`, measured against `now`.
///
/// A missing directory yields an empty result.
pub fn cleanup_old_logs(
    dir: &Path,
    retention: &LogRetention,
    now: SystemTime,
) -> io::Result<CleanupResult> {
    let mut result = CleanupResult::default();
    if !dir.exists() {
        return Ok(result);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_log_file(&path) {
            continue;
        }

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot read mtime of {}: {}", path.display(), e);
                result.failed += 1;
                continue;
            }
        };
        // Files stamped in the future count as fresh
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        if !retention.should_cleanup(age) {
            result.retained += 1;
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(
                    "Old log file deleted: {}",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                );
                result.deleted.push(path);
            }
            Err(e) => {
                warn!("Failed to delete old log file {}: {}", path.display(), e);
                result.failed += 1;
            }
        }
    }

    Ok(result)
}
