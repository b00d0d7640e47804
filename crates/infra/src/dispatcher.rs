//! Single-writer allocation pipeline.
//!
//! The dispatcher owns the ledger behind an `RwLock` and is the only code
//! path that mutates it:
//!
//! ```text
//! AllocationCandidate
//!   ↓  (write lock taken)
//! 1. Validate against live stock
//!   ↓
//! 2. Commit: clamping decrement per entry, audit log
//!   ↓
//! 3. Persist the ledger snapshot
//!   ↓  (write lock released)
//! CommittedAllocation (grants + AllocationLog)
//! ```
//!
//! Steps 1-3 run under one write guard, so no other commit can consume stock
//! between validation and decrement. Reads (`read`, `preview`) share the lock
//! and may run concurrently with each other.
//!
//! ## Persistence failures
//!
//! The ledger is mutated before the snapshot is written. If the write fails,
//! the mutation stands and the caller receives [`CommitError::Persist`]
//! carrying the log of what was applied. Retry with
//! [`AllocationDispatcher::persist`]; never by re-submitting the candidate.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::{info, warn};

use relief_core::{AllocationCandidate, AllocationRunId, DomainError};
use relief_inventory::{
    AllocationCommitter, AllocationLog, AllocationValidator, InventoryLedger, MatchPolicy, ValidatedAllocation, Validation,
};

use crate::snapshot::{SnapshotError, SnapshotStore};

#[derive(Debug, Error)]
pub enum CommitError {
    /// The ledger was mutated (see `log`) but the snapshot write failed.
    #[error("allocation applied but snapshot persistence failed: {source}")]
    Persist {
        log: Box<AllocationLog>,
        #[source]
        source: SnapshotError,
    },

    #[error("snapshot persistence failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("stored snapshot is invalid: {0}")]
    InvalidSnapshot(#[from] DomainError),
}

/// What a successful commit granted and how each line was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedAllocation {
    pub allocation: ValidatedAllocation,
    pub log: AllocationLog,
}

pub struct AllocationDispatcher<S> {
    ledger: RwLock<InventoryLedger>,
    store: S,
}

impl<S: SnapshotStore> AllocationDispatcher<S> {
    pub fn new(ledger: InventoryLedger, store: S) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            store,
        }
    }

    /// Load the stored ledger, or seed the relief catalogue and persist it
    /// immediately when the store is empty.
    pub fn bootstrap(store: S, policy: MatchPolicy) -> Result<Self, BootstrapError> {
        let ledger = match store.load()? {
            Some(snapshot) => {
                let ledger = InventoryLedger::from_snapshot(snapshot)?;
                info!(items = ledger.len(), "ledger restored from snapshot");
                ledger
            }
            None => {
                let ledger = InventoryLedger::relief_defaults();
                store.save(&ledger.snapshot())?;
                info!(items = ledger.len(), "ledger seeded with default relief catalogue");
                ledger
            }
        };
        Ok(Self::new(ledger.with_match_policy(policy), store))
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, InventoryLedger>, CommitError> {
        self.ledger
            .read()
            .map_err(|_| CommitError::Unavailable("ledger lock poisoned".to_string()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, InventoryLedger>, CommitError> {
        self.ledger
            .write()
            .map_err(|_| CommitError::Unavailable("ledger lock poisoned".to_string()))
    }

    /// Run `f` against the ledger under a shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&InventoryLedger) -> R) -> Result<R, CommitError> {
        let ledger = self.read_guard()?;
        Ok(f(&ledger))
    }

    /// Validate without mutating. The result may be stale by the time it is shown.
    pub fn preview(&self, candidate: &AllocationCandidate) -> Result<Validation, CommitError> {
        let ledger = self.read_guard()?;
        Ok(AllocationValidator::new(&ledger).validate(candidate))
    }

    /// Validate, decrement and persist as one critical section.
    ///
    /// Blocks on the snapshot write; async callers go through
    /// [`crate::ReliefPlanner::commit`], which runs this on the blocking pool.
    pub fn commit(&self, candidate: &AllocationCandidate) -> Result<CommittedAllocation, CommitError> {
        let run_id = AllocationRunId::new();
        let mut ledger = self.write_guard()?;

        let validation = AllocationValidator::new(&ledger).validate(candidate);
        let allocation = validation.allocation.clone();
        let log = AllocationCommitter::new(run_id).commit(&mut ledger, validation);

        if let Err(source) = self.store.save(&ledger.snapshot()) {
            warn!(run = %run_id, error = %source, "allocation applied but snapshot write failed");
            return Err(CommitError::Persist {
                log: Box::new(log),
                source,
            });
        }

        info!(run = %run_id, units = log.total_units(), "allocation persisted");
        Ok(CommittedAllocation { allocation, log })
    }

    /// Write the current ledger state again (e.g. after a failed commit persist).
    pub fn persist(&self) -> Result<(), CommitError> {
        let ledger = self.read_guard()?;
        self.store.save(&ledger.snapshot())?;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use relief_inventory::{AllocationOutcome, LedgerSnapshot};

    use crate::snapshot::InMemorySnapshotStore;

    /// Store whose writes fail until switched back on.
    #[derive(Default)]
    struct FlakyStore {
        failing: AtomicBool,
        saves: AtomicUsize,
        inner: InMemorySnapshotStore,
    }

    impl SnapshotStore for FlakyStore {
        fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
            self.inner.load()
        }

        fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SnapshotError::Unavailable("disk full".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(snapshot)
        }
    }

    fn candidate(pairs: &[(&str, i64)]) -> AllocationCandidate {
        pairs.iter().map(|(n, q)| (n.to_string(), *q)).collect()
    }

    #[test]
    fn bootstrap_seeds_and_persists_when_store_is_empty() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let dispatcher = AllocationDispatcher::bootstrap(store.clone(), MatchPolicy::FirstMatch).unwrap();

        assert_eq!(dispatcher.read(|l| l.len()).unwrap(), 10);
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn bootstrap_restores_existing_snapshot() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let mut ledger = InventoryLedger::relief_defaults();
        ledger.decrement("Tents", 25).unwrap();
        store.save(&ledger.snapshot()).unwrap();

        let dispatcher = AllocationDispatcher::bootstrap(store, MatchPolicy::RejectAmbiguous).unwrap();
        let (tents, policy) = dispatcher
            .read(|l| (l.get("Tents").map(|i| i.quantity()), l.match_policy()))
            .unwrap();
        assert_eq!(tents, Some(0));
        assert_eq!(policy, MatchPolicy::RejectAmbiguous);
    }

    #[test]
    fn commit_mutates_and_persists() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let dispatcher = AllocationDispatcher::new(InventoryLedger::relief_defaults(), store.clone());

        let committed = dispatcher.commit(&candidate(&[("Water Bottles", 500), ("Helicopter", 1)])).unwrap();
        assert_eq!(committed.allocation.granted("Water Bottles"), Some(300));
        assert_eq!(committed.allocation.len(), 1);
        let log = committed.log;
        assert_eq!(log.records()[0].outcome, AllocationOutcome::Partial);
        assert_eq!(log.records()[1].outcome, AllocationOutcome::RejectedUnknownItem);

        let persisted = store.load().unwrap().unwrap();
        let water = persisted.items.iter().find(|i| i.name() == "Water Bottles").unwrap();
        assert_eq!(water.quantity(), 0);
    }

    #[test]
    fn persist_failure_keeps_mutation_and_reports_log() {
        let store = Arc::new(FlakyStore::default());
        let dispatcher = AllocationDispatcher::new(InventoryLedger::relief_defaults(), store.clone());
        store.failing.store(true, Ordering::SeqCst);

        let err = dispatcher.commit(&candidate(&[("Blankets", 30)])).unwrap_err();
        match err {
            CommitError::Persist { log, .. } => assert_eq!(log.total_units(), 30),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(dispatcher.read(|l| l.get("Blankets").unwrap().quantity()).unwrap(), 50);

        // Retrying persistence writes the already-mutated state without re-applying.
        store.failing.store(false, Ordering::SeqCst);
        dispatcher.persist().unwrap();
        let persisted = store.load().unwrap().unwrap();
        let blankets = persisted.items.iter().find(|i| i.name() == "Blankets").unwrap();
        assert_eq!(blankets.quantity(), 50);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn preview_does_not_mutate() {
        let dispatcher = AllocationDispatcher::new(InventoryLedger::relief_defaults(), InMemorySnapshotStore::new());
        let v = dispatcher.preview(&candidate(&[("Tents", 10)])).unwrap();
        assert_eq!(v.allocation.granted("Tents"), Some(10));
        assert_eq!(dispatcher.read(|l| l.get("Tents").unwrap().quantity()).unwrap(), 25);
    }

    #[test]
    fn concurrent_commits_never_overcommit() {
        let dispatcher = Arc::new(AllocationDispatcher::new(
            InventoryLedger::relief_defaults(),
            InMemorySnapshotStore::new(),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                thread::spawn(move || d.commit(&candidate(&[("Tents", 4)])).unwrap().log.total_units())
            })
            .collect();

        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 25);
        assert_eq!(dispatcher.read(|l| l.get("Tents").unwrap().quantity()).unwrap(), 0);
    }
}
