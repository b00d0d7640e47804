use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use relief_core::{Category, DomainError, DomainResult, ItemId};

use crate::item::InventoryItem;
use crate::matching::{self, MatchPolicy};
use crate::summary::InventorySummary;

/// Result of a clamping decrement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Decrement {
    pub requested: u64,
    pub removed: u64,
    pub remaining: u64,
}

impl Decrement {
    pub fn is_complete(&self) -> bool {
        self.removed == self.requested
    }
}

/// Persistable ledger state: the item list plus the index position → item id mapping.
///
/// Both halves are always written together; a snapshot whose mapping does not
/// cover exactly the listed items is rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub items: Vec<InventoryItem>,
    pub id_map: Vec<ItemId>,
}

/// Authoritative in-memory stock record.
///
/// Items are never removed; only their quantities go down. Names are unique
/// case-insensitively. Callers own the exclusive-access discipline (the ledger
/// itself is a plain value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLedger {
    items: Vec<InventoryItem>,
    id_map: Vec<ItemId>,
    baseline: HashMap<ItemId, u64>,
    policy: MatchPolicy,
}

impl InventoryLedger {
    pub fn new(items: Vec<InventoryItem>) -> DomainResult<Self> {
        let id_map = items.iter().map(InventoryItem::id).collect();
        Self::from_snapshot(LedgerSnapshot { items, id_map })
    }

    /// Rebuild a ledger from persisted state, validating id and name uniqueness
    /// and that `id_map` covers exactly the listed items.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> DomainResult<Self> {
        let LedgerSnapshot { items, id_map } = snapshot;

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for item in &items {
            if !ids.insert(item.id()) {
                return Err(DomainError::conflict(format!("duplicate item id {}", item.id())));
            }
            if !names.insert(item.key()) {
                return Err(DomainError::conflict(format!("duplicate item name '{}'", item.name())));
            }
        }

        if id_map.len() != items.len() {
            return Err(DomainError::invariant(format!(
                "id map has {} entries for {} items",
                id_map.len(),
                items.len()
            )));
        }
        let mut mapped = HashSet::new();
        for id in &id_map {
            if !ids.contains(id) || !mapped.insert(*id) {
                return Err(DomainError::invariant(format!(
                    "id map entry {id} does not correspond to exactly one item"
                )));
            }
        }

        let baseline = items.iter().map(|i| (i.id(), i.quantity())).collect();
        Ok(Self {
            items,
            id_map,
            baseline,
            policy: MatchPolicy::default(),
        })
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The relief catalogue used when no persisted snapshot exists.
    pub fn relief_defaults() -> Self {
        let seed: [(u64, &str, u64, Category, u8); 10] = [
            (1, "Medical Kit", 50, Category::Medical, 1),
            (2, "Emergency Food Pack", 100, Category::Food, 2),
            (3, "Water Bottles", 300, Category::Water, 1),
            (4, "Rescue Tubes", 30, Category::Rescue, 2),
            (5, "Blankets", 80, Category::Shelter, 2),
            (6, "First Aid Bandages", 500, Category::Medical, 1),
            (7, "Flashlights", 50, Category::Equipment, 3),
            (8, "Batteries", 200, Category::Equipment, 3),
            (9, "Tents", 25, Category::Shelter, 2),
            (10, "Antibiotics", 150, Category::Medical, 1),
        ];

        let items = seed
            .into_iter()
            .filter_map(|(id, name, qty, category, priority)| {
                InventoryItem::new(ItemId::new(id), name, qty, category)
                    .and_then(|i| i.with_priority(priority))
                    .ok()
            })
            .collect::<Vec<_>>();

        let id_map = items.iter().map(InventoryItem::id).collect();
        let baseline = items.iter().map(|i| (i.id(), i.quantity())).collect();
        Self {
            items,
            id_map,
            baseline,
            policy: MatchPolicy::default(),
        }
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn items(&self) -> &[InventoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index position → item id, in the order the semantic index was built.
    pub fn id_map(&self) -> &[ItemId] {
        &self.id_map
    }

    /// Case-insensitive exact lookup. Never fuzzy.
    pub fn get(&self, name: &str) -> Option<&InventoryItem> {
        matching::find_exact(&self.items, name).map(|idx| &self.items[idx])
    }

    pub fn get_by_id(&self, id: ItemId) -> Option<&InventoryItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    /// Allocation-path lookup: exact first, then substring under the ledger's match policy.
    pub fn resolve(&self, name: &str) -> DomainResult<&InventoryItem> {
        matching::resolve(&self.items, name, self.policy).map(|idx| &self.items[idx])
    }

    /// Remove `min(qty, available)` units from the item named exactly `name`.
    ///
    /// Never fails for lack of stock; the returned [`Decrement`] reports how
    /// much was actually removed.
    pub fn decrement(&mut self, name: &str, qty: u64) -> DomainResult<Decrement> {
        let idx = matching::find_exact(&self.items, name).ok_or_else(|| DomainError::unknown_item(name))?;
        let item = &mut self.items[idx];
        let removed = item.take(qty);
        Ok(Decrement {
            requested: qty,
            removed,
            remaining: item.quantity(),
        })
    }

    /// Quantity recorded when this ledger was seeded or loaded.
    pub fn baseline(&self, id: ItemId) -> u64 {
        self.baseline.get(&id).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> InventorySummary {
        InventorySummary::from_ledger(self)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            items: self.items.clone(),
            id_map: self.id_map.clone(),
        }
    }
}
