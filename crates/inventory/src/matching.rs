//! Item-name resolution policy used on the allocation path.
//!
//! Resolution is exact (case-insensitive) first, then substring containment in
//! either direction. Names that originate from the ledger itself never go
//! through the substring step.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use relief_core::{DomainError, DomainResult};

use crate::item::{normalize_name, InventoryItem};

/// What to do when more than one item satisfies the substring rule.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Take the first match in ledger order.
    #[default]
    FirstMatch,
    /// Fail with [`DomainError::AmbiguousItem`].
    RejectAmbiguous,
}

impl FromStr for MatchPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first-match" => Ok(MatchPolicy::FirstMatch),
            "reject-ambiguous" => Ok(MatchPolicy::RejectAmbiguous),
            other => Err(DomainError::validation(format!(
                "match policy must be one of: first-match, reject-ambiguous (got '{other}')"
            ))),
        }
    }
}

/// Case-insensitive exact match only.
pub(crate) fn find_exact(items: &[InventoryItem], name: &str) -> Option<usize> {
    let needle = normalize_name(name);
    if needle.is_empty() {
        return None;
    }
    items.iter().position(|item| item.key() == needle)
}

/// Exact match, falling back to substring containment under `policy`.
pub(crate) fn resolve(items: &[InventoryItem], name: &str, policy: MatchPolicy) -> DomainResult<usize> {
    if let Some(idx) = find_exact(items, name) {
        return Ok(idx);
    }

    let needle = normalize_name(name);
    if needle.is_empty() {
        return Err(DomainError::unknown_item(name));
    }

    let mut matches = items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            let key = item.key();
            key.contains(&needle) || needle.contains(&key)
        })
        .map(|(idx, _)| idx);

    let Some(first) = matches.next() else {
        return Err(DomainError::unknown_item(name));
    };

    if policy == MatchPolicy::RejectAmbiguous {
        let rest: Vec<usize> = matches.collect();
        if !rest.is_empty() {
            let candidates = std::iter::once(first)
                .chain(rest)
                .map(|idx| items[idx].name().to_string())
                .collect();
            return Err(DomainError::AmbiguousItem {
                name: name.to_string(),
                candidates,
            });
        }
    }

    Ok(first)
}
