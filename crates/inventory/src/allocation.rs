//! Allocation values: the validated grant set and the audit log a commit produces.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use relief_core::{AllocationRunId, ItemId};

/// One granted line, resolved to a canonical ledger item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationEntry {
    pub item_id: ItemId,
    /// Canonical ledger name (never the fuzzy input).
    pub name: String,
    /// What was asked for before validation.
    pub requested: u64,
    /// `min(requested, available)` at validation time; always > 0.
    pub granted: u64,
}

/// Stock-bounded allocation. The only input the committer accepts.
///
/// Serialises as a `name → granted` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedAllocation {
    entries: Vec<AllocationEntry>,
}

impl ValidatedAllocation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A later entry for the same item replaces the earlier one in place.
    pub(crate) fn upsert(&mut self, entry: AllocationEntry) {
        match self.entries.iter_mut().find(|e| e.item_id == entry.item_id) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn granted(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.granted)
    }

    pub fn total_granted(&self) -> u64 {
        self.entries.iter().map(|e| e.granted).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ValidatedAllocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for e in &self.entries {
            map.serialize_entry(&e.name, &e.granted)?;
        }
        map.end()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationOutcome {
    Full,
    Partial,
    RejectedOutOfStock,
    RejectedUnknownItem,
    RejectedAmbiguousItem,
}

impl AllocationOutcome {
    pub fn is_rejected(&self) -> bool {
        !matches!(self, AllocationOutcome::Full | AllocationOutcome::Partial)
    }
}

/// Per-item outcome of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    /// Canonical name when resolved, otherwise the name as requested.
    pub item: String,
    pub item_id: Option<ItemId>,
    pub requested: u64,
    pub granted: u64,
    pub outcome: AllocationOutcome,
    /// Stock after this record was applied; `None` for unresolved names.
    pub resulting_stock: Option<u64>,
}

impl AllocationRecord {
    pub(crate) fn rejected(
        item: impl Into<String>,
        item_id: Option<ItemId>,
        requested: u64,
        outcome: AllocationOutcome,
        resulting_stock: Option<u64>,
    ) -> Self {
        Self {
            item: item.into(),
            item_id,
            requested,
            granted: 0,
            outcome,
            resulting_stock,
        }
    }
}

impl core::fmt::Display for AllocationRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let after = self.resulting_stock.unwrap_or(0);
        let before = after + self.granted;
        match self.outcome {
            AllocationOutcome::Full => write!(
                f,
                "Allocated {} {} (stock {before} -> {after})",
                self.granted, self.item
            ),
            AllocationOutcome::Partial => write!(
                f,
                "Partially allocated {} {} (requested {}, stock {before} -> {after})",
                self.granted, self.item, self.requested
            ),
            AllocationOutcome::RejectedOutOfStock => write!(
                f,
                "Cannot allocate {} (out of stock, requested {})",
                self.item, self.requested
            ),
            AllocationOutcome::RejectedUnknownItem => write!(f, "Item not found: {}", self.item),
            AllocationOutcome::RejectedAmbiguousItem => {
                write!(f, "Ambiguous item name: {}", self.item)
            }
        }
    }
}

/// Append-only outcome sequence for one run.
///
/// Committed lines come first in request order, followed by lines rejected at
/// validation time (also in request order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationLog {
    pub run_id: AllocationRunId,
    pub committed_at: DateTime<Utc>,
    records: Vec<AllocationRecord>,
}

impl AllocationLog {
    pub fn new(run_id: AllocationRunId, committed_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            committed_at,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: AllocationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    /// Number of items that received at least one unit.
    pub fn items_allocated(&self) -> usize {
        self.records.iter().filter(|r| r.granted > 0).count()
    }

    pub fn total_units(&self) -> u64 {
        self.records.iter().map(|r| r.granted).sum()
    }

    /// Human-readable lines, one per record, plus a summary when anything was granted.
    pub fn render(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.records.iter().map(ToString::to_string).collect();
        if self.items_allocated() > 0 {
            lines.push(format!(
                "Allocation summary: {} item(s), {} unit(s)",
                self.items_allocated(),
                self.total_units()
            ));
        }
        lines
    }
}
