//! Ledger snapshot persistence.
//!
//! A snapshot holds the item list and the index id map together, so one write
//! always leaves a consistent pair on disk. File writes go to a temporary file
//! in the target directory and are renamed into place.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use relief_inventory::LedgerSnapshot;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot format version {found} (expected {SNAPSHOT_FORMAT_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// On-disk envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    saved_at: DateTime<Utc>,
    ledger: LedgerSnapshot,
}

pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError>;

    /// Replace the stored snapshot as one unit.
    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError>;
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
        (**self).load()
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        (**self).save(snapshot)
    }
}

/// JSON file store with write-to-temp-then-rename replacement.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: SnapshotFile = serde_json::from_reader(BufReader::new(file))?;
        if envelope.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: envelope.format_version,
            });
        }
        debug!(path = %self.path.display(), saved_at = %envelope.saved_at, "snapshot loaded");
        Ok(Some(envelope.ledger))
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        let dir = self.dir();
        fs::create_dir_all(dir)?;

        let envelope = SnapshotFile {
            format_version: SNAPSHOT_FORMAT_VERSION,
            saved_at: Utc::now(),
            ledger: snapshot.clone(),
        };

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &envelope)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SnapshotError::Io(e.error))?;

        debug!(path = %self.path.display(), items = snapshot.items.len(), "snapshot saved");
        Ok(())
    }
}

/// Process-local store for tests and runs without a snapshot path.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: RwLock<Option<LedgerSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, SnapshotError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| SnapshotError::Unavailable("in-memory snapshot lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| SnapshotError::Unavailable("in-memory snapshot lock poisoned".to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
