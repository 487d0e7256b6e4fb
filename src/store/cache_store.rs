// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Typed, namespaced access to cache entries over a [`KeyValueStore`]

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::cache::CacheEntry;
use crate::context::{Interrupted, RequestContext};
use crate::errors::{CorruptEntryError, QueryError, StoreError};
use crate::key::CacheKey;

/// Outcome of scanning a key prefix
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Decoded entries, sorted by key
    pub entries: Vec<(CacheKey, CacheEntry)>,
    /// Entries whose stored bytes could not be decoded
    pub corrupt: Vec<CorruptEntryError>,
}

/// Cache store adapter
///
/// Wraps an injected [`KeyValueStore`] with entry encoding, a per-call time
/// budget and request cancellation. Store failures are returned as
/// [`QueryError::StoreUnavailable`]; they are never reported as a miss.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
    timeout: Duration,
    scan_concurrency: usize,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .field("scan_concurrency", &self.scan_concurrency)
            .finish()
    }
}

impl CacheStore {
    /// Wrap `backend`, bounding each call by `timeout`
    pub fn new(backend: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            scan_concurrency: 1,
        }
    }

    /// Fetch up to `concurrency` entries at once during scans
    pub fn with_scan_concurrency(mut self, concurrency: usize) -> Self {
        self.scan_concurrency = concurrency.max(1);
        self
    }

    /// The wrapped backend
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    fn interrupted(&self, operation: &'static str, interrupted: Interrupted) -> QueryError {
        match interrupted {
            Interrupted::Cancelled => QueryError::cancelled(operation),
            Interrupted::DeadlineExceeded(budget) => {
                StoreError::timeout(self.backend.name(), operation, budget).into()
            }
        }
    }

    async fn get_raw(&self, ctx: &RequestContext, key: &str) -> Result<Option<Vec<u8>>, QueryError> {
        ctx.run(self.timeout, self.backend.get(key))
            .await
            .map_err(|i| self.interrupted("get", i))?
            .map_err(QueryError::from)
    }

    /// Look up the entry stored under `key`
    ///
    /// A value that does not decode is logged and reported as absent, so the
    /// caller recomputes and overwrites it.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry>, QueryError> {
        let Some(bytes) = self.get_raw(ctx, key.as_str()).await? else {
            return Ok(None);
        };

        match CacheEntry::decode(key.as_str(), &bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(corrupt) => {
                warn!(key = %key, error = %corrupt, "Corrupt entry under exact key, treating as miss");
                Ok(None)
            }
        }
    }

    /// Store `entry` under `key`, replacing any previous value
    pub async fn set(
        &self,
        ctx: &RequestContext,
        key: &CacheKey,
        entry: &CacheEntry,
    ) -> Result<(), QueryError> {
        let bytes = entry.encode().map_err(StoreError::serialization)?;
        ctx.run(self.timeout, self.backend.set(key.as_str(), bytes))
            .await
            .map_err(|i| self.interrupted("set", i))??;
        debug!(key = %key, rows = entry.results.len(), "Stored cache entry");
        Ok(())
    }

    /// Fetch and decode every entry whose key starts with `prefix`
    ///
    /// Keys are visited in sorted order and fetched with bounded
    /// concurrency. A key that disappears between listing and fetching is
    /// skipped. The scan stops at the first store failure or cancellation.
    pub async fn scan(&self, ctx: &RequestContext, prefix: &str) -> Result<ScanResult, QueryError> {
        let mut keys = ctx
            .run(self.timeout, self.backend.scan_keys(prefix))
            .await
            .map_err(|i| self.interrupted("scan_keys", i))??;
        keys.sort_unstable();
        debug!(prefix = %prefix, keys = keys.len(), "Scanning cache namespace");

        let mut fetches = stream::iter(keys)
            .map(|key| async move {
                let fetched = self.get_raw(ctx, &key).await;
                (key, fetched)
            })
            .buffered(self.scan_concurrency);

        let mut result = ScanResult::default();
        while let Some((key, fetched)) = fetches.next().await {
            if ctx.is_cancelled() {
                return Err(QueryError::cancelled("scan"));
            }
            let Some(bytes) = fetched? else {
                debug!(key = %key, "Key vanished during scan");
                continue;
            };
            match CacheEntry::decode(&key, &bytes) {
                Ok(entry) => result.entries.push((CacheKey::from_raw(key), entry)),
                Err(corrupt) => result.corrupt.push(corrupt),
            }
        }

        Ok(result)
    }
}
