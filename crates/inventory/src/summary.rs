//! Read-only inventory status report.

use std::collections::BTreeMap;

use serde::Serialize;

use relief_core::{Category, ItemId};

use crate::ledger::InventoryLedger;

/// Stock level bucket for display.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Ok,
    Low,
    Out,
}

impl StockStatus {
    pub fn for_quantity(quantity: u64) -> Self {
        match quantity {
            0 => StockStatus::Out,
            1..=10 => StockStatus::Low,
            _ => StockStatus::Ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStatus {
    pub id: ItemId,
    pub name: String,
    pub category: Category,
    pub priority: u8,
    pub quantity: u64,
    pub baseline: u64,
    pub used: u64,
    pub status: StockStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub units: u64,
    /// Share of all remaining units, 0.0 when nothing remains.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventorySummary {
    pub items: Vec<ItemStatus>,
    pub total_remaining: u64,
    pub total_used: u64,
    pub by_category: Vec<CategoryShare>,
}

impl InventorySummary {
    pub fn from_ledger(ledger: &InventoryLedger) -> Self {
        let mut items = Vec::with_capacity(ledger.len());
        let mut per_category: BTreeMap<Category, u64> = BTreeMap::new();

        for item in ledger.items() {
            let baseline = ledger.baseline(item.id());
            let used = baseline.saturating_sub(item.quantity());
            *per_category.entry(item.category()).or_default() += item.quantity();
            items.push(ItemStatus {
                id: item.id(),
                name: item.name().to_string(),
                category: item.category(),
                priority: item.priority(),
                quantity: item.quantity(),
                baseline,
                used,
                status: StockStatus::for_quantity(item.quantity()),
            });
        }

        let total_remaining: u64 = items.iter().map(|i| i.quantity).sum();
        let total_used: u64 = items.iter().map(|i| i.used).sum();

        let by_category = per_category
            .into_iter()
            .map(|(category, units)| CategoryShare {
                category,
                units,
                percent: if total_remaining == 0 {
                    0.0
                } else {
                    units as f64 * 100.0 / total_remaining as f64
                },
            })
            .collect();

        Self {
            items,
            total_remaining,
            total_used,
            by_category,
        }
    }
}
