// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Durable watermark storage
//!
//! The checkpoint file holds a single JSON record:
//! `{"watermark": 8, "updatedAt": "2025-01-01T00:00:00+00:00"}`
//!
//! A bare value (`8`, `"evt-7"`, or plain text as written by older tooling)
//! is also accepted on load.

use crate::checkpoint::watermark::{SequenceId, Watermark};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Refusing to move watermark backwards from {current} to {requested}")]
    Regression { current: String, requested: String },
    #[error("Nothing to persist: watermark is at origin")]
    OriginNotPersistable,
}

impl CheckpointError {
    pub fn error_code(&self) -> &'static str {
        match self {
            CheckpointError::Io { .. } => "CHECKPOINT_IO",
            CheckpointError::Serialization(_) => "CHECKPOINT_SERIALIZATION",
            CheckpointError::Regression { .. } => "CHECKPOINT_REGRESSION",
            CheckpointError::OriginNotPersistable => "CHECKPOINT_ORIGIN",
        }
    }
}

/// On-disk checkpoint record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    pub watermark: SequenceId,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(watermark: SequenceId) -> Self {
        Self {
            watermark,
            updated_at: Utc::now(),
        }
    }

    /// Decode file contents; `None` when the contents hold no usable watermark
    pub fn decode(raw: &str) -> Option<Watermark> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(record) = serde_json::from_str::<CheckpointRecord>(trimmed) {
            return Some(Watermark::At(record.watermark));
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return SequenceId::from_json(&value).map(Watermark::At);
        }
        // Plain-text legacy file: a single bare token, never truncated JSON
        if trimmed.starts_with(&['{', '[', '"'][..]) || trimmed.contains(char::is_whitespace) {
            return None;
        }
        SequenceId::parse(trimmed).map(Watermark::At)
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persisted watermark, or `Watermark::Origin` when none is usable.
    async fn load(&self) -> Watermark;

    /// Atomically replace the persisted watermark. Rejects regressions.
    async fn save(&self, watermark: &Watermark) -> Result<(), CheckpointError>;

    /// Replace the persisted watermark without the monotonic guard.
    async fn overwrite(&self, watermark: &Watermark) -> Result<(), CheckpointError>;
}

fn guard_monotonic(current: &Watermark, requested: &Watermark) -> Result<(), CheckpointError> {
    if requested.is_origin() {
        return Err(CheckpointError::OriginNotPersistable);
    }
    if requested < current {
        return Err(CheckpointError::Regression {
            current: current.to_string(),
            requested: requested.to_string(),
        });
    }
    Ok(())
}

/// File-backed checkpoint store
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write_atomic(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        let id = watermark
            .sequence_id()
            .ok_or(CheckpointError::OriginNotPersistable)?;
        let record = CheckpointRecord::new(id.clone());
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_err(e))?;
            }
        }

        // Write to a sibling temp file, then rename over the target
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| self.io_err(e))?;
        file.sync_all().await.map_err(|e| self.io_err(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;

        info!(path = %self.path.display(), watermark = %watermark, "Checkpoint saved");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Watermark {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No checkpoint found, starting from origin");
                return Watermark::Origin;
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Checkpoint unreadable ({}), starting from origin", e);
                return Watermark::Origin;
            }
        };

        match CheckpointRecord::decode(&raw) {
            Some(watermark) => {
                info!(path = %self.path.display(), watermark = %watermark, "Checkpoint loaded");
                watermark
            }
            None => {
                warn!(path = %self.path.display(), "Checkpoint corrupt, starting from origin");
                Watermark::Origin
            }
        }
    }

    async fn save(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        let current = self.load().await;
        guard_monotonic(&current, watermark)?;
        self.write_atomic(watermark).await
    }

    async fn overwrite(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        self.write_atomic(watermark).await
    }
}

/// In-memory checkpoint store for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    value: Arc<Mutex<Watermark>>,
    save_count: Arc<Mutex<usize>>,
    fail_saves: Arc<Mutex<bool>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watermark(watermark: Watermark) -> Self {
        Self {
            value: Arc::new(Mutex::new(watermark)),
            ..Self::default()
        }
    }

    pub async fn current(&self) -> Watermark {
        self.value.lock().await.clone()
    }

    pub async fn save_count(&self) -> usize {
        *self.save_count.lock().await
    }

    /// Make every subsequent save fail with an I/O error
    pub async fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().await = fail;
    }

    async fn store(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        if *self.fail_saves.lock().await {
            return Err(CheckpointError::Io {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected save failure"),
            });
        }
        *self.value.lock().await = watermark.clone();
        *self.save_count.lock().await += 1;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Watermark {
        self.current().await
    }

    async fn save(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        let current = self.current().await;
        guard_monotonic(&current, watermark)?;
        self.store(watermark).await
    }

    async fn overwrite(&self, watermark: &Watermark) -> Result<(), CheckpointError> {
        if watermark.is_origin() {
            return Err(CheckpointError::OriginNotPersistable);
        }
        self.store(watermark).await
    }
}
