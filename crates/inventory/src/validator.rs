//! Reconciles an unvalidated candidate against live ledger stock.

use tracing::debug;

use relief_core::{AllocationCandidate, DomainError};

use crate::allocation::{AllocationEntry, AllocationOutcome, AllocationRecord, ValidatedAllocation};
use crate::ledger::InventoryLedger;

/// Output of validation: the grant set plus the lines that were rejected on the way.
///
/// Entries with a missing, non-integer or non-positive quantity are dropped
/// without a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub allocation: ValidatedAllocation,
    pub rejections: Vec<AllocationRecord>,
}

/// Stateless validator over a borrowed ledger.
///
/// Guarantees `granted <= min(requested, available)` for every entry and never
/// fails as a whole because of one bad line.
#[derive(Debug, Copy, Clone)]
pub struct AllocationValidator<'a> {
    ledger: &'a InventoryLedger,
}

impl<'a> AllocationValidator<'a> {
    pub fn new(ledger: &'a InventoryLedger) -> Self {
        Self { ledger }
    }

    pub fn validate(&self, candidate: &AllocationCandidate) -> Validation {
        let mut allocation = ValidatedAllocation::new();
        let mut rejections = Vec::new();

        for entry in candidate.entries() {
            let requested = match entry.quantity {
                Some(q) if q > 0 => q as u64,
                other => {
                    debug!(item = %entry.name, quantity = ?other, "dropping entry with non-positive or non-integer quantity");
                    continue;
                }
            };

            let item = match self.ledger.resolve(&entry.name) {
                Ok(item) => item,
                Err(DomainError::AmbiguousItem { name, candidates }) => {
                    debug!(item = %name, ?candidates, "rejecting ambiguous item name");
                    rejections.push(AllocationRecord::rejected(
                        name,
                        None,
                        requested,
                        AllocationOutcome::RejectedAmbiguousItem,
                        None,
                    ));
                    continue;
                }
                Err(_) => {
                    debug!(item = %entry.name, "rejecting unknown item");
                    rejections.push(AllocationRecord::rejected(
                        entry.name.clone(),
                        None,
                        requested,
                        AllocationOutcome::RejectedUnknownItem,
                        None,
                    ));
                    continue;
                }
            };

            let granted = requested.min(item.quantity());
            if granted == 0 {
                rejections.push(AllocationRecord::rejected(
                    item.name(),
                    Some(item.id()),
                    requested,
                    AllocationOutcome::RejectedOutOfStock,
                    Some(item.quantity()),
                ));
                continue;
            }

            allocation.upsert(AllocationEntry {
                item_id: item.id(),
                name: item.name().to_string(),
                requested,
                granted,
            });
        }

        Validation {
            allocation,
            rejections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::InventoryItem;
    use crate::matching::MatchPolicy;
    use proptest::prelude::*;
    use relief_core::{Category, ItemId};

    fn ledger_with(items: &[(&str, u64, Category)]) -> InventoryLedger {
        InventoryLedger::new(
            items
                .iter()
                .enumerate()
                .map(|(i, (name, qty, cat))| InventoryItem::new(ItemId::new(i as u64 + 1), *name, *qty, *cat).unwrap())
                .collect(),
        )
        .unwrap()
    }

    fn candidate(pairs: &[(&str, i64)]) -> AllocationCandidate {
        pairs.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    #[test]
    fn caps_request_at_available_stock() {
        let ledger = ledger_with(&[("Water Bottles", 100, Category::Water)]);
        let v = AllocationValidator::new(&ledger).validate(&candidate(&[("Water Bottles", 500)]));

        assert_eq!(v.allocation.granted("Water Bottles"), Some(100));
        let entry = &v.allocation.entries()[0];
        assert_eq!(entry.requested, 500);
        assert!(v.rejections.is_empty());
    }

    #[test]
    fn fuzzy_name_resolves_to_canonical_name() {
        let ledger = ledger_with(&[("First Aid Bandages", 500, Category::Medical)]);
        let v = AllocationValidator::new(&ledger).validate(&candidate(&[("bandages", 10)]));
        assert_eq!(v.allocation.granted("First Aid Bandages"), Some(10));
    }

    #[test]
    fn unrelated_name_is_rejected_as_unknown() {
        let ledger = ledger_with(&[("First Aid Bandages", 500, Category::Medical)]);
        let v = AllocationValidator::new(&ledger).validate(&candidate(&[("Bandaids", 10)]));

        assert!(v.allocation.is_empty());
        assert_eq!(v.rejections.len(), 1);
        assert_eq!(v.rejections[0].outcome, AllocationOutcome::RejectedUnknownItem);
        assert_eq!(v.rejections[0].item, "Bandaids");
    }

    #[test]
    fn out_of_stock_item_is_rejected() {
        let ledger = ledger_with(&[("Tents", 0, Category::Shelter)]);
        let v = AllocationValidator::new(&ledger).validate(&candidate(&[("Tents", 3)]));

        assert!(v.allocation.is_empty());
        assert_eq!(v.rejections[0].outcome, AllocationOutcome::RejectedOutOfStock);
        assert_eq!(v.rejections[0].resulting_stock, Some(0));
    }

    #[test]
    fn invalid_quantities_are_dropped_silently() {
        let ledger = ledger_with(&[("Tents", 10, Category::Shelter), ("Blankets", 10, Category::Shelter)]);
        let mut c = candidate(&[("Tents", 0), ("Blankets", -4)]);
        c.insert("Tents", None);
        let v = AllocationValidator::new(&ledger).validate(&c);

        assert!(v.allocation.is_empty());
        assert!(v.rejections.is_empty());
    }

    #[test]
    fn ambiguous_name_is_rejected_under_strict_policy() {
        let ledger = ledger_with(&[
            ("Water Bottles", 10, Category::Water),
            ("Water Purification Tablets", 10, Category::Water),
        ])
        .with_match_policy(MatchPolicy::RejectAmbiguous);

        let v = AllocationValidator::new(&ledger).validate(&candidate(&[("water", 5)]));
        assert!(v.allocation.is_empty());
        assert_eq!(v.rejections[0].outcome, AllocationOutcome::RejectedAmbiguousItem);
    }

    #[test]
    fn repeated_item_keeps_last_request() {
        let ledger = ledger_with(&[("Water Bottles", 100, Category::Water)]);
        let v = AllocationValidator::new(&ledger)
            .validate(&candidate(&[("Water Bottles", 10), ("water", 30)]));
        assert_eq!(v.allocation.len(), 1);
        assert_eq!(v.allocation.granted("Water Bottles"), Some(30));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every granted quantity is bounded by both the request and
        /// the stock that was available when validation ran.
        #[test]
        fn grants_never_exceed_request_or_stock(
            requests in prop::collection::vec((0usize..12, -50i64..1_000), 0..24)
        ) {
            let ledger = InventoryLedger::relief_defaults();
            let mut names: Vec<String> = ledger.items().iter().map(|i| i.name().to_string()).collect();
            names.push("Bandages".to_string());
            names.push("Helicopter".to_string());

            let c: AllocationCandidate = requests
                .iter()
                .map(|(idx, q)| (names[*idx].clone(), *q))
                .collect();
            let v = AllocationValidator::new(&ledger).validate(&c);

            for e in v.allocation.entries() {
                let available = ledger.get_by_id(e.item_id).unwrap().quantity();
                prop_assert!(e.granted > 0);
                prop_assert!(e.granted <= e.requested);
                prop_assert!(e.granted <= available);
            }
        }
    }
}
