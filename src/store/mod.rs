// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Key-value store backends and the typed cache store adapter
//!
//! The query service reaches its cache through two layers:
//!
//! - [`KeyValueStore`]: raw `get` / `set` / `scan_keys` over byte values,
//!   implemented by each backend
//! - [`CacheStore`]: namespaced, typed access to [`CacheEntry`] values with
//!   per-call timeouts and cancellation
//!
//! Backends:
//!
//! - [`MemoryStore`]: in-process `HashMap` (tests, single-process services)
//! - [`DiskStore`]: persistent JSON file with file locking
//! - [`NoOpStore`]: disables caching entirely
//!
//! # Examples
//!
//! ```rust,ignore
//! use emissions_cache::store::{DiskStore, MemoryStore, NoOpStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let store = Arc::new(DiskStore::new("emissions-cache.json").validate()?);
//! let store = Arc::new(NoOpStore);
//! ```
//!
//! [`CacheEntry`]: crate::CacheEntry

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::StoreError;

mod cache_store;
mod disk;
mod memory;
mod noop;

pub use cache_store::{CacheStore, ScanResult};
pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use noop::NoOpStore;

/// Statistics about store traffic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of `get` calls that found a value
    pub hits: u64,
    /// Number of `get` calls that found nothing
    pub misses: u64,
    /// Number of `set` calls
    pub writes: u64,
    /// Number of `scan_keys` calls
    pub scans: u64,
    /// Current number of stored values
    pub entries: usize,
}

impl StoreStats {
    /// Calculates the hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, writes={}, scans={}, entries={}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.writes,
            self.scans,
            self.entries,
            self.hit_rate()
        )
    }
}

/// Trait for key-value store backends
///
/// # Semantics
///
/// - `set` overwrites: the last write for a key wins, nothing is merged
/// - `get` and `scan_keys` never mutate stored values
/// - failures are reported as [`StoreError`]; an unreachable store must never
///   look like an empty one
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access. Use
/// interior mutability (e.g., `Mutex`, `RwLock`) as needed.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// List every key beginning with `prefix`, in no particular order
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Current traffic statistics
    async fn stats(&self) -> StoreStats;

    /// Human-readable backend name, used in logs and errors
    fn name(&self) -> &'static str;
}
