//! Inventory domain module.
//!
//! Ledger, name matching, allocation validation and commit, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod allocation;
pub mod committer;
pub mod item;
pub mod ledger;
pub mod matching;
pub mod summary;
pub mod validator;

pub use allocation::{AllocationEntry, AllocationLog, AllocationOutcome, AllocationRecord, ValidatedAllocation};
pub use committer::AllocationCommitter;
pub use item::InventoryItem;
pub use ledger::{Decrement, InventoryLedger, LedgerSnapshot};
pub use matching::MatchPolicy;
pub use summary::{CategoryShare, InventorySummary, ItemStatus, StockStatus};
pub use validator::{AllocationValidator, Validation};
