//! Supply-side value types shared by the inventory, estimation and parsing layers.

use core::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::DomainError;
use crate::id::ItemId;

/// Fixed supply category enumeration.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Medical,
    Water,
    Food,
    Shelter,
    Equipment,
    Rescue,
    #[default]
    General,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Medical,
        Category::Water,
        Category::Food,
        Category::Shelter,
        Category::Equipment,
        Category::Rescue,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medical => "medical",
            Category::Water => "water",
            Category::Food => "food",
            Category::Shelter => "shelter",
            Category::Equipment => "equipment",
            Category::Rescue => "rescue",
            Category::General => "general",
        }
    }

    /// Parse a category, mapping anything unrecognised to [`Category::General`].
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| DomainError::validation(format!("unknown category: {s}")))
    }
}

/// Read-only projection of an inventory item plus its retrieval distance.
///
/// Produced per query by the semantic index; nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: u64,
    pub category: Category,
    pub priority: u8,
    /// Opaque ordering information (smaller is nearer). Not a probability.
    pub distance: f32,
}

/// Estimated per-item need for a single query evaluation.
///
/// Insertion order follows the retrieval order of the candidates it was built
/// from; serialises as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementEstimate {
    entries: Vec<(String, u64)>,
}

impl RequirementEstimate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the estimate for `name` (first insertion fixes the position).
    pub fn insert(&mut self, name: impl Into<String>, quantity: u64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = quantity,
            None => self.entries.push((name, quantity)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, q)| *q)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, q)| (n.as_str(), *q))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RequirementEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, qty) in &self.entries {
            map.serialize_entry(name, qty)?;
        }
        map.end()
    }
}

/// One requested line of an unvalidated allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateEntry {
    /// Name as produced upstream; may be misspelled or differently cased.
    pub name: String,
    /// `None` when the source value was not an integer (string, float, null, ...).
    pub quantity: Option<i64>,
}

/// Unvalidated name → quantity request, typically decoded from model output.
///
/// Transient: discarded once validated against the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AllocationCandidate {
    entries: Vec<CandidateEntry>,
}

impl AllocationCandidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request; a repeated name keeps its first position and takes the latest quantity.
    pub fn insert(&mut self, name: impl Into<String>, quantity: Option<i64>) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.quantity = quantity,
            None => self.entries.push(CandidateEntry { name, quantity }),
        }
    }

    /// Build a candidate from a decoded JSON object. Non-integer values are kept as `None`
    /// so that validation can reject them explicitly.
    pub fn from_json_object(object: &Map<String, JsonValue>) -> Self {
        let mut candidate = Self::new();
        for (name, value) in object {
            candidate.insert(name.clone(), value.as_i64());
        }
        candidate
    }

    /// Deterministic fallback: request exactly the estimated need for each item.
    pub fn from_estimate(estimate: &RequirementEstimate) -> Self {
        let mut candidate = Self::new();
        for (name, qty) in estimate.iter() {
            candidate.insert(name, Some(i64::try_from(qty).unwrap_or(i64::MAX)));
        }
        candidate
    }

    pub fn entries(&self) -> &[CandidateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, i64)> for AllocationCandidate {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        let mut candidate = Self::new();
        for (name, qty) in iter {
            candidate.insert(name, Some(qty));
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_parsing_is_case_insensitive_with_general_fallback() {
        assert_eq!("Medical".parse::<Category>().unwrap(), Category::Medical);
        assert!("vehicles".parse::<Category>().is_err());
        assert_eq!(Category::parse_lenient("vehicles"), Category::General);
    }

    #[test]
    fn estimate_serialises_in_insertion_order() {
        let mut est = RequirementEstimate::new();
        est.insert("Water Bottles", 202);
        est.insert("Medical Kit", 13);
        est.insert("Water Bottles", 3);

        assert_eq!(est.len(), 2);
        let s = serde_json::to_string(&est).unwrap();
        assert_eq!(s, r#"{"Water Bottles":3,"Medical Kit":13}"#);
    }

    #[test]
    fn candidate_from_json_keeps_non_integers_as_none() {
        let obj = json!({"Water Bottles": 30, "Tents": "ten", "Blankets": 2.5});
        let candidate = AllocationCandidate::from_json_object(obj.as_object().unwrap());

        let entries = candidate.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].quantity, Some(30));
        assert_eq!(entries[1].quantity, None);
        assert_eq!(entries[2].quantity, None);
    }

    #[test]
    fn candidate_from_estimate_mirrors_estimate() {
        let mut est = RequirementEstimate::new();
        est.insert("Tents", 7);
        let candidate = AllocationCandidate::from_estimate(&est);
        assert_eq!(
            candidate.entries(),
            &[CandidateEntry {
                name: "Tents".to_string(),
                quantity: Some(7)
            }]
        );
    }
}
