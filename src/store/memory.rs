// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory key-value store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, StoreStats};
use crate::errors::StoreError;

/// Internal state for memory store
#[derive(Debug, Default)]
struct MemoryStoreState {
    /// Stored values
    entries: HashMap<String, Vec<u8>>,
    /// Traffic statistics
    stats: StoreStats,
}

/// In-memory key-value store
///
/// Values live in a `HashMap` behind an async mutex. There is no eviction:
/// entries stay until the store is dropped.
///
/// # Examples
///
/// ```rust,ignore
/// use emissions_cache::store::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("emissions:abc", b"{}".to_vec()).await?;
/// assert_eq!(store.scan_keys("emissions:").await?, vec!["emissions:abc"]);
/// ```
///
/// # Performance
///
/// - Get / Set: O(1) average case
/// - Scan: O(n) over all stored keys
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryStoreState>,
}

impl MemoryStore {
    /// Creates an empty memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut state = self.state.lock().await;

        let value = state.entries.get(key).cloned();
        if value.is_some() {
            state.stats.hits += 1;
            debug!(key = %key, "Store hit (memory)");
        } else {
            state.stats.misses += 1;
            debug!(key = %key, "Store miss (memory)");
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        debug!(key = %key, bytes = value.len(), "Writing value to memory store");
        state.entries.insert(key.to_owned(), value);
        state.stats.writes += 1;
        state.stats.entries = state.entries.len();

        Ok(())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock().await;
        state.stats.scans += 1;

        let keys: Vec<String> = state
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        debug!(prefix = %prefix, keys = keys.len(), "Scanned memory store");

        Ok(keys)
    }

    async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        state.stats.clone()
    }

    fn name(&self) -> &'static str {
        "MemoryStore"
    }
}
