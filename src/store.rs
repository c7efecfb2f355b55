//! Persisted state store for published tasks.
//!
//! The store is the local record of which content-addresses are already
//! represented remotely, and under which item identifier. It is advisory:
//! never re-derived from the backend, read once at the start of a
//! reconciliation pass and written at most once at the end.
//!
//! Opening the store takes an exclusive advisory lock on a `.lock` sibling
//! of the state file and holds it until the store is dropped, so the whole
//! load-modify-persist span of a pass is one critical section. Overlapping
//! passes against the same store serialize on that lock. Writes go through
//! a temp file and rename for atomicity.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// State file name inside the state directory.
const STATE_FILE: &str = "state.json";

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// Current on-disk state format version.
const STATE_VERSION: u32 = 1;

// ============================================================================
// Task Entry
// ============================================================================

/// One published task: "this content-address is represented by `item_id`
/// in the active tracker, originating from `file`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Content-address of the task (see [`crate::hash::task_hash`]).
    pub hash: String,
    /// Remote item identifier returned by the provider at create time.
    pub item_id: String,
    /// File the task originated from.
    pub file: PathBuf,
    /// When the entry was recorded locally.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TaskEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(hash: impl Into<String>, item_id: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            hash: hash.into(),
            item_id: item_id.into(),
            file: file.into(),
            created_at: Utc::now(),
        }
    }
}

/// On-disk layout of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    entries: Vec<serde_json::Value>,
}

// ============================================================================
// Task Store
// ============================================================================

/// Durable store of [`TaskEntry`] records, one flat sequence process-wide.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use todosync::store::{TaskEntry, TaskStore};
///
/// let mut store = TaskStore::open(Path::new(".todosync")).unwrap();
/// store.insert(TaskEntry::new("abc123", "item-1", "src/main.rs"));
/// store.persist().unwrap();
/// ```
#[derive(Debug)]
pub struct TaskStore {
    dir: PathBuf,
    entries: Vec<TaskEntry>,
    dirty: bool,
    /// Held for the lifetime of the store; the advisory lock is released
    /// when this handle is dropped.
    _lock: File,
}

impl TaskStore {
    /// Open the store in `dir`, taking the exclusive lock and loading
    /// whatever state survives lenient parsing.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(format!("{STATE_FILE}{LOCK_SUFFIX}"));
        let lock = File::create(&lock_path)?;
        FileExt::lock_exclusive(&lock).map_err(|e| SyncError::StoreLock {
            path: lock_path,
            message: e.to_string(),
        })?;

        let entries = Self::load_entries(&dir.join(STATE_FILE));

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
            dirty: false,
            _lock: lock,
        })
    }

    /// Read entries from disk, dropping whatever does not parse.
    ///
    /// Missing file means empty state. A corrupt file is logged and treated
    /// as empty rather than failing the pass. Individual entries missing an
    /// `item_id` (or a `hash`) are filtered silently for migration
    /// tolerance.
    fn load_entries(path: &Path) -> Vec<TaskEntry> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read state file {}: {e}", path.display());
                return Vec::new();
            }
        };

        let raw: Vec<serde_json::Value> = match serde_json::from_str::<serde_json::Value>(&contents)
        {
            // Current layout: object with a version and an entries array.
            Ok(serde_json::Value::Object(mut map)) => {
                match map.remove("entries") {
                    Some(serde_json::Value::Array(entries)) => entries,
                    _ => {
                        warn!("State file {} has no entries array", path.display());
                        Vec::new()
                    }
                }
            }
            // Pre-versioning layout: a bare array of entries.
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                warn!("State file {} has unexpected shape", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!(
                    "Corrupted state file {}: {e}. Starting with empty state.",
                    path.display()
                );
                Vec::new()
            }
        };

        raw.into_iter()
            .filter_map(|value| match serde_json::from_value::<TaskEntry>(value) {
                Ok(entry) if !entry.item_id.is_empty() && !entry.hash.is_empty() => Some(entry),
                Ok(_) => {
                    debug!("Dropping stored entry with empty hash or item_id");
                    None
                }
                Err(e) => {
                    debug!("Dropping malformed stored entry: {e}");
                    None
                }
            })
            .collect()
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// All stored entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    /// Entries belonging to one file partition.
    #[must_use]
    pub fn entries_for_file(&self, file: &Path) -> Vec<&TaskEntry> {
        self.entries.iter().filter(|e| e.file == file).collect()
    }

    /// Whether a hash already has an entry within a file partition.
    #[must_use]
    pub fn contains(&self, file: &Path, hash: &str) -> bool {
        self.entries.iter().any(|e| e.file == file && e.hash == hash)
    }

    /// Append an entry and mark the store dirty.
    pub fn insert(&mut self, entry: TaskEntry) {
        self.entries.push(entry);
        self.dirty = true;
    }

    /// Remove the entry for `(file, hash)`, marking the store dirty when
    /// something was actually removed.
    pub fn remove(&mut self, file: &Path, hash: &str) -> Option<TaskEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.file == file && e.hash == hash)?;
        self.dirty = true;
        Some(self.entries.remove(idx))
    }

    /// Whether in-memory state has diverged from disk.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write state to disk if anything changed since load.
    ///
    /// A clean store is a no-op, so passes with no task delta never touch
    /// the file. The write is atomic: temp file, fsync, rename.
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let state = StateFile {
            version: STATE_VERSION,
            entries: self
                .entries
                .iter()
                .map(|e| serde_json::to_value(e))
                .collect::<std::result::Result<_, _>>()?,
        };
        let json = serde_json::to_string_pretty(&state)?;

        let tmp_path = self.dir.join(format!("{STATE_FILE}{TMP_SUFFIX}"));
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, self.state_path())?;
        self.dirty = false;

        debug!(
            "Persisted {} task entries to {}",
            self.entries.len(),
            self.state_path().display()
        );
        Ok(())
    }
}
