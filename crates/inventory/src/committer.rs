//! Applies a validated allocation to the ledger.

use chrono::Utc;
use tracing::{info, warn};

use relief_core::AllocationRunId;

use crate::allocation::{AllocationLog, AllocationOutcome, AllocationRecord};
use crate::ledger::InventoryLedger;
use crate::validator::Validation;

/// Decrements the ledger line by line and records the outcome of each.
///
/// Persistence is the caller's job and happens after this returns: the
/// in-memory mutation is authoritative even when the snapshot write later
/// fails.
#[derive(Debug, Copy, Clone)]
pub struct AllocationCommitter {
    run_id: AllocationRunId,
}

impl AllocationCommitter {
    pub fn new(run_id: AllocationRunId) -> Self {
        Self { run_id }
    }

    pub fn commit(&self, ledger: &mut InventoryLedger, validation: Validation) -> AllocationLog {
        let mut log = AllocationLog::new(self.run_id, Utc::now());

        for entry in validation.allocation.entries() {
            let record = match ledger.decrement(&entry.name, entry.granted) {
                Ok(d) => {
                    // Outcome is judged against the original ask, not the capped grant.
                    let outcome = if d.removed == 0 {
                        AllocationOutcome::RejectedOutOfStock
                    } else if d.removed < entry.requested {
                        AllocationOutcome::Partial
                    } else {
                        AllocationOutcome::Full
                    };
                    AllocationRecord {
                        item: entry.name.clone(),
                        item_id: Some(entry.item_id),
                        requested: entry.requested,
                        granted: d.removed,
                        outcome,
                        resulting_stock: Some(d.remaining),
                    }
                }
                Err(e) => {
                    warn!(run = %self.run_id, item = %entry.name, error = %e, "validated item vanished before commit");
                    AllocationRecord::rejected(
                        entry.name.clone(),
                        Some(entry.item_id),
                        entry.requested,
                        AllocationOutcome::RejectedUnknownItem,
                        None,
                    )
                }
            };
            log.push(record);
        }

        for rejection in validation.rejections {
            log.push(rejection);
        }

        info!(
            run = %self.run_id,
            items = log.items_allocated(),
            units = log.total_units(),
            "allocation committed"
        );
        log
    }
}
