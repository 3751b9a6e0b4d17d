// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Run configuration
//!
//! Built once at startup from the environment (optionally seeded from a
//! `.env` file) and handed to the sync runner. Core logic never reads the
//! environment itself.
//!
//! | Variable                     | Required | Default                         |
//! |------------------------------|----------|---------------------------------|
//! | `API_URL`                    | yes      |                                 |
//! | `SALESFORCE_USERNAME`        | yes      |                                 |
//! | `SALESFORCE_PASSWORD`        | yes      |                                 |
//! | `SALESFORCE_SECURITY_TOKEN`  | no       | empty                           |
//! | `SALESFORCE_CLIENT_ID`       | yes      |                                 |
//! | `SALESFORCE_CLIENT_SECRET`   | yes      |                                 |
//! | `SALESFORCE_LOGIN_URL`       | no       | `https://login.salesforce.com`  |
//! | `SALESFORCE_API_VERSION`     | no       | `v59.0`                         |
//! | `CHECKPOINT_PATH`            | no       | `last_processed_id.json`        |
//! | `LOG_DIR`                    | no       | `logs`                          |
//! | `LOG_RETENTION_DAYS`         | no       | `30`                            |
//! | `HTTP_TIMEOUT_SECS`          | no       | `30`                            |

use crate::crm::salesforce::{DEFAULT_API_VERSION, DEFAULT_LOGIN_URL};
use crate::crm::SalesforceCredentials;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CHECKPOINT_PATH: &str = "last_processed_id.json";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_RETENTION_DAYS: u64 = 30;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Failed to load env file {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

/// Local file locations, needed by every command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub checkpoint_path: PathBuf,
    pub log_dir: PathBuf,
}

impl RuntimePaths {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            checkpoint_path: get("CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
            log_dir: get("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub feed_url: String,
    pub salesforce: SalesforceCredentials,
    pub checkpoint_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_retention_days: u64,
    pub http_timeout: Duration,
}

/// Load `path` into the process environment. Variables already set win.
///
/// A missing file is not an error; the environment alone may be enough.
pub fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    if !path.exists() {
        debug!("No env file at {}", path.display());
        return Ok(false);
    }
    dotenv::from_path(path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!("Environment variables loaded from {}", path.display());
    Ok(true)
}

impl SyncConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(name) {
                None => Ok(default),
                Some(raw) => raw
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid { name, value: raw }),
            }
        };

        let feed_url = required("API_URL")?;
        if !(feed_url.starts_with("http://") || feed_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "API_URL",
                value: feed_url,
            });
        }

        let salesforce = SalesforceCredentials {
            login_url: get("SALESFORCE_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
            api_version: get("SALESFORCE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            client_id: required("SALESFORCE_CLIENT_ID")?,
            client_secret: required("SALESFORCE_CLIENT_SECRET")?,
            username: required("SALESFORCE_USERNAME")?,
            password: required("SALESFORCE_PASSWORD")?,
            security_token: get("SALESFORCE_SECURITY_TOKEN").unwrap_or_default(),
        };

        let http_timeout_secs = number("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        let log_retention_days = number("LOG_RETENTION_DAYS", DEFAULT_LOG_RETENTION_DAYS)?;
        if log_retention_days.checked_mul(SECS_PER_DAY).is_none() {
            return Err(ConfigError::Invalid {
                name: "LOG_RETENTION_DAYS",
                value: log_retention_days.to_string(),
            });
        }

        let paths = RuntimePaths::from_lookup(&lookup);

        Ok(Self {
            feed_url,
            salesforce,
            checkpoint_path: paths.checkpoint_path,
            log_dir: paths.log_dir,
            log_retention_days,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(self.log_retention_days.saturating_mul(SECS_PER_DAY))
    }
}
