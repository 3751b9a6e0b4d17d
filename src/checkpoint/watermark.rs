// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Sequence identifiers and the watermark derived from them
//!
//! Feed identifiers arrive either as JSON numbers or as JSON strings. Strings
//! holding the canonical decimal form of an integer (`"8"`, not `"08"`) are
//! treated as numbers so that `"10" > "9"` holds the way operators expect.
//!
//! ## Ordering
//! - numeric vs numeric: numeric comparison
//! - text vs text: lexicographic comparison
//! - numeric vs text: numeric always sorts first

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a single feed entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceId {
    Numeric(i64),
    Text(String),
}

impl SequenceId {
    /// Parse an identifier from its textual form.
    ///
    /// Returns `None` for empty strings, which cannot be ordered meaningfully.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Some(SequenceId::Numeric(n)),
            _ => Some(SequenceId::Text(raw.to_string())),
        }
    }

    /// Build an identifier from a JSON value.
    ///
    /// Integers within `i64` range, integral floats (`6.0`) and non-empty
    /// strings are accepted. Fractional or out-of-range numbers, booleans,
    /// null, arrays and objects are rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(SequenceId::Numeric),
            serde_json::Value::String(s) => SequenceId::parse(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SequenceId::Numeric(n) => serde_json::Value::from(*n),
            SequenceId::Text(s) => serde_json::Value::from(s.clone()),
        }
    }
}

fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

impl Ord for SequenceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SequenceId::Numeric(a), SequenceId::Numeric(b)) => a.cmp(b),
            (SequenceId::Text(a), SequenceId::Text(b)) => a.cmp(b),
            (SequenceId::Numeric(_), SequenceId::Text(_)) => Ordering::Less,
            (SequenceId::Text(_), SequenceId::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SequenceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceId::Numeric(n) => write!(f, "{}", n),
            SequenceId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SequenceId {
    fn from(n: i64) -> Self {
        SequenceId::Numeric(n)
    }
}

impl Serialize for SequenceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SequenceId::Numeric(n) => serializer.serialize_i64(*n),
            SequenceId::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        SequenceId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid sequence id: {}", value)))
    }
}

/// Highest sequence id fully processed across prior runs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Watermark {
    /// Nothing processed yet; lower than every sequence id
    #[default]
    Origin,
    At(SequenceId),
}

impl Watermark {
    /// True when `id` is strictly newer than this watermark
    pub fn admits(&self, id: &SequenceId) -> bool {
        match self {
            Watermark::Origin => true,
            Watermark::At(current) => id > current,
        }
    }

    /// Advance to `id` if it is newer; never moves backwards
    pub fn advance(&mut self, id: &SequenceId) {
        if self.admits(id) {
            *self = Watermark::At(id.clone());
        }
    }

    pub fn sequence_id(&self) -> Option<&SequenceId> {
        match self {
            Watermark::Origin => None,
            Watermark::At(id) => Some(id),
        }
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, Watermark::Origin)
    }
}

impl From<SequenceId> for Watermark {
    fn from(id: SequenceId) -> Self {
        Watermark::At(id)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Origin => f.write_str("<origin>"),
            Watermark::At(id) => write!(f, "{}", id),
        }
    }
}
