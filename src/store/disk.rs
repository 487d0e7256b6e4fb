// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Disk-backed key-value store with file locking and versioning

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{KeyValueStore, StoreStats};
use crate::errors::StoreError;

/// Current store file format version
const STORE_VERSION: u32 = 1;

/// Backend name reported in errors
const BACKEND: &str = "DiskStore";

/// Serialized store file (versioned)
///
/// Values are kept as JSON text rather than byte arrays so the file stays
/// readable when inspecting cached entries by hand.
#[derive(Debug, Serialize, Deserialize)]
struct StoreData {
    /// Store format version
    version: u32,
    /// Stored values by key
    entries: BTreeMap<String, String>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Internal state for disk store
#[derive(Debug, Default)]
struct DiskStoreState {
    /// Traffic statistics (in-memory only, not persisted)
    stats: StoreStats,
}

/// How the sidecar lock is held for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Disk-based key-value store with file locking and atomic writes
///
/// This store persists values to a single JSON file with:
/// - An advisory lock on a sidecar `<file>.lock`, held shared by reads and
///   exclusively by `set` across the whole read, insert and replace, so
///   handles in any process sharing the path never drop each other's keys
/// - Format versioning; a file with another version is ignored
/// - Atomic replacement through a uniquely named temp file and rename
///
/// File I/O and lock waits run on tokio's blocking pool.
///
/// Values must be valid UTF-8. Unlike a cache that degrades gracefully, every
/// I/O or parse failure is returned to the caller as a [`StoreError`].
///
/// # Examples
///
/// ```rust,ignore
/// use emissions_cache::store::DiskStore;
///
/// let store = DiskStore::new("/var/cache/emissions.json").validate()?;
/// ```
///
/// # Performance
///
/// Every call reads (and `set` rewrites) the whole file, so cost grows with
/// the number of stored entries. Writers on one path are serialized.
#[derive(Debug)]
pub struct DiskStore {
    path: PathBuf,
    state: Mutex<DiskStoreState>,
}

impl DiskStore {
    /// Creates a new disk store at the specified path
    ///
    /// The file is created on the first `set`. Path validation is NOT
    /// performed until the first I/O operation; use
    /// [`validate()`](Self::validate) to check the path immediately.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(DiskStoreState::default()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar lock file, `<file>.lock`
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Validates the store path and creates the parent directory if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or is not writable.
    pub fn validate(self) -> Result<Self, StoreError> {
        let parent = parent_dir(&self.path);

        if !parent.exists() {
            std::fs::create_dir_all(&parent)
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
            debug!(path = %parent.display(), "Created store directory");
        }

        // Validate parent is writable by attempting to create a temp file
        NamedTempFile::new_in(&parent)
            .map_err(|e| StoreError::io(parent.display().to_string(), e))?;

        debug!(path = %self.path.display(), "Store path validated successfully");
        Ok(self)
    }

    /// Run `op` against the store file on the blocking pool while holding
    /// the sidecar lock in `mode`
    async fn locked<T, F>(
        &self,
        operation: &'static str,
        mode: LockMode,
        op: F,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path();

        tokio::task::spawn_blocking(move || {
            let lock = acquire_lock(&lock_path, mode)?;
            let result = op(&path);
            // Unlock by dropping the file
            drop(lock);
            result
        })
        .await
        .map_err(|e| StoreError::unavailable(BACKEND, operation, e.to_string()))?
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Open the lock file and lock it, blocking until the lock is granted
///
/// A shared lock on a store whose directory does not exist yet returns
/// `None`: there is nothing to read and nothing to create.
fn acquire_lock(lock_path: &Path, mode: LockMode) -> Result<Option<File>, StoreError> {
    let io_error = |e: std::io::Error| StoreError::io(lock_path.display().to_string(), e);

    let parent = parent_dir(lock_path);
    if !parent.exists() {
        if mode == LockMode::Shared {
            return Ok(None);
        }
        std::fs::create_dir_all(&parent)
            .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(io_error)?;
    let locked = match mode {
        LockMode::Shared => file.lock_shared(),
        LockMode::Exclusive => file.lock(),
    };
    locked.map_err(io_error)?;

    Ok(Some(file))
}

/// Read the store file; the caller holds the lock
fn read_data(path: &Path) -> Result<StoreData, StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Store file does not exist, using empty store");
        return Ok(StoreData::default());
    }

    let file = File::open(path).map_err(|e| StoreError::io(path.display().to_string(), e))?;
    let data: StoreData =
        serde_json::from_reader(BufReader::new(file)).map_err(StoreError::serialization)?;

    if data.version != STORE_VERSION {
        warn!(
            path = %path.display(),
            stored_version = data.version,
            current_version = STORE_VERSION,
            "Store version mismatch, ignoring stored data"
        );
        return Ok(StoreData::default());
    }

    debug!(
        path = %path.display(),
        entries = data.entries.len(),
        "Loaded store file"
    );
    Ok(data)
}

/// Replace the store file through a fresh temp file in the same directory;
/// the caller holds the exclusive lock
fn write_data(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(data).map_err(StoreError::serialization)?;
    let parent = parent_dir(path);
    let io_error = |e: std::io::Error| StoreError::io(path.display().to_string(), e);

    let mut temp = NamedTempFile::new_in(&parent)
        .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
    temp.write_all(&json).map_err(io_error)?;
    temp.as_file().sync_all().map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;

    debug!(
        path = %path.display(),
        entries = data.entries.len(),
        "Saved store file"
    );
    Ok(())
}

#[async_trait]
impl KeyValueStore for DiskStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = self.state.lock().await;
        let data = self.locked("get", LockMode::Shared, read_data).await?;

        match data.entries.get(key) {
            Some(value) => {
                state.stats.hits += 1;
                debug!(key = %key, "Store hit (disk)");
                Ok(Some(value.clone().into_bytes()))
            }
            None => {
                state.stats.misses += 1;
                debug!(key = %key, "Store miss (disk)");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let text = String::from_utf8(value).map_err(|e| StoreError::InvalidValue {
            backend: self.name(),
            key: key.to_owned(),
            details: e.to_string(),
        })?;

        let mut state = self.state.lock().await;
        debug!(key = %key, "Writing value to disk store");

        let key = key.to_owned();
        let entries = self
            .locked("set", LockMode::Exclusive, move |path| {
                let mut data = read_data(path)?;
                data.entries.insert(key, text);
                write_data(path, &data)?;
                Ok(data.entries.len())
            })
            .await?;

        state.stats.writes += 1;
        state.stats.entries = entries;
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock().await;
        let data = self.locked("scan_keys", LockMode::Shared, read_data).await?;
        state.stats.scans += 1;

        Ok(data
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn stats(&self) -> StoreStats {
        let mut state = self.state.lock().await;

        // Update entry count from disk
        if let Ok(data) = self.locked("stats", LockMode::Shared, read_data).await {
            state.stats.entries = data.entries.len();
        }

        state.stats.clone()
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}
