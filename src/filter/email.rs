// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Syntactic email address validation

use regex::Regex;
use std::sync::OnceLock;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

fn local_part_regex() -> &'static Regex {
    static LOCAL: OnceLock<Regex> = OnceLock::new();
    LOCAL.get_or_init(|| {
        // dot-atom: atext runs separated by single dots
        Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
            .unwrap()
    })
}

fn label_regex() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$").unwrap())
}

/// True when `address` is a syntactically valid `local@domain` address.
///
/// The domain must have at least two labels. The top-level label starts
/// with a letter or is an IDNA A-label (`xn--p1ai`).
pub fn is_valid_email(address: &str) -> bool {
    if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
        return false;
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > MAX_LOCAL_LEN || !local_part_regex().is_match(local) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    if labels
        .iter()
        .any(|l| l.is_empty() || l.len() > MAX_LABEL_LEN || !label_regex().is_match(l))
    {
        return false;
    }

    labels.last().map(|tld| is_top_level_label(tld)).unwrap_or(false)
}

fn is_top_level_label(label: &str) -> bool {
    let is_a_label = label.len() > 4 && label[..4].eq_ignore_ascii_case("xn--");
    is_a_label || label.starts_with(|c: char| c.is_ascii_alphabetic())
}
