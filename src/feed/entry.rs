// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use crate::checkpoint::SequenceId;
use crate::feed::FeedError;
use serde_json::Value;
use tracing::warn;

/// A single feed entry as delivered by the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub sequence_id: SequenceId,
    /// Raw recipient payload; `None` when absent or not a string
    pub recipient_email: Option<String>,
}

impl FeedEntry {
    pub fn new(sequence_id: impl Into<SequenceId>, recipient_email: Option<&str>) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            recipient_email: recipient_email.map(str::to_string),
        }
    }

    /// Parse one entry of the form `[id, email?, ...]`.
    ///
    /// Returns `None` when the entry has no orderable id.
    pub fn from_json(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        let sequence_id = SequenceId::from_json(items.first()?)?;
        let recipient_email = items
            .get(1)
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            sequence_id,
            recipient_email,
        })
    }
}

fn unusable_id_reason(item: &Value) -> &'static str {
    match item.as_array().and_then(|items| items.first()) {
        None => "not an [id, email] array",
        Some(Value::Number(n)) if n.is_u64() => "integer id exceeds the signed 64-bit range",
        Some(Value::Number(_)) => "numeric id is not an integer",
        Some(Value::String(_)) => "empty id",
        Some(_) => "id is not a number or string",
    }
}

/// Parse a full feed body.
///
/// Fails only when the body is not a JSON array. Individual entries that
/// cannot be ordered are dropped with a warning.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| FeedError::Malformed("expected a JSON array of entries".to_string()))?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match FeedEntry::from_json(item) {
            Some(entry) => entries.push(entry),
            None => warn!(
                "Dropping feed entry ({}): {}",
                unusable_id_reason(item),
                item
            ),
        }
    }
    Ok(entries)
}
