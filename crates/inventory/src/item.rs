use serde::{Deserialize, Serialize};

use relief_core::{Category, DomainError, DomainResult, ItemId, RetrievedCandidate};

/// A stocked relief supply.
///
/// `quantity` is the only field that changes after seeding, and only through
/// [`crate::InventoryLedger::decrement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: ItemId,
    name: String,
    quantity: u64,
    #[serde(default)]
    category: Category,
    #[serde(default = "default_priority")]
    priority: u8,
}

fn default_priority() -> u8 {
    1
}

impl InventoryItem {
    pub fn new(id: ItemId, name: impl Into<String>, quantity: u64, category: Category) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            quantity,
            category,
            priority: default_priority(),
        })
    }

    /// Lower is more urgent; zero is rejected.
    pub fn with_priority(mut self, priority: u8) -> DomainResult<Self> {
        if priority == 0 {
            return Err(DomainError::validation("priority must be a positive integer"));
        }
        self.priority = priority;
        Ok(self)
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Text the semantic index embeds for this item.
    pub fn search_text(&self) -> String {
        format!("{} {} emergency relief supply", self.name, self.category)
    }

    pub fn to_candidate(&self, distance: f32) -> RetrievedCandidate {
        RetrievedCandidate {
            item_id: self.id,
            name: self.name.clone(),
            quantity: self.quantity,
            category: self.category,
            priority: self.priority,
            distance,
        }
    }

    /// Remove up to `qty` units. Returns how many were actually removed.
    pub(crate) fn take(&mut self, qty: u64) -> u64 {
        let removed = qty.min(self.quantity);
        self.quantity -= removed;
        removed
    }

    pub(crate) fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Case-insensitive comparison key for item names.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
