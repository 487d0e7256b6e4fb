// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Test helpers for emissions cache integration tests
//!
//! Provides fake stores and sources so the query service can be exercised
//! without a real cache server or dataset export.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use emissions_cache::store::{KeyValueStore, MemoryStore, StoreStats};
use emissions_cache::{
    CancelHandle, DateRange, DatasetError, EmissionRecord, EmissionsSource, InMemoryDataset,
    StoreError,
};

/// Parse a `YYYY-MM-DD` test date
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Build a dataset row
pub fn record(day: &str, facility: &str, amount: f64) -> EmissionRecord {
    EmissionRecord::new(date(day), facility, amount)
}

/// Store operation a [`FailingStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Set,
    Scan,
}

/// In-memory store that fails selected operations
///
/// Operations that are not set to fail are served by an inner
/// [`MemoryStore`], so a test can seed data and then break one path.
///
/// # Example
///
/// ```rust,ignore
/// let store = FailingStore::new().failing_on(StoreOp::Scan);
/// ```
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: Mutex<Vec<StoreOp>>,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with [`StoreError::Unavailable`]
    pub fn failing_on(self, op: StoreOp) -> Self {
        self.fail(op);
        self
    }

    /// Start failing `op` from now on
    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap().push(op);
    }

    /// Total calls of any operation, failed or not
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, op: StoreOp, operation: &'static str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StoreError::unavailable(
                self.name(),
                operation,
                "connection refused",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check(StoreOp::Get, "get")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.check(StoreOp::Set, "set")?;
        self.inner.set(key, value).await
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check(StoreOp::Scan, "scan_keys")?;
        self.inner.scan_keys(prefix).await
    }

    async fn stats(&self) -> StoreStats {
        self.inner.stats().await
    }

    fn name(&self) -> &'static str {
        "FailingStore"
    }
}

/// Store that slows down or cancels the request partway through
///
/// Every `get` sleeps for the configured delay. When a cancel handle is
/// attached, the `n`-th `get` fires it before returning its value.
#[derive(Debug, Default)]
pub struct GatedStore {
    inner: MemoryStore,
    get_delay: Duration,
    cancel_on_get: Mutex<Option<(usize, CancelHandle)>>,
    gets: AtomicUsize,
}

impl GatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` in every `get`
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    /// Cancel through `handle` during the `n`-th `get` (1-based)
    pub fn cancel_on_get(self, n: usize, handle: CancelHandle) -> Self {
        *self.cancel_on_get.lock().unwrap() = Some((n, handle));
        self
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let n = self.gets.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        {
            let gate = self.cancel_on_get.lock().unwrap();
            if let Some((at, handle)) = gate.as_ref() {
                if *at == n {
                    handle.cancel();
                }
            }
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.scan_keys(prefix).await
    }

    async fn stats(&self) -> StoreStats {
        self.inner.stats().await
    }

    fn name(&self) -> &'static str {
        "GatedStore"
    }
}

/// Dataset source that counts selections
///
/// Delegates to an [`InMemoryDataset`], or fails every call when built with
/// [`CountingSource::unavailable`].
#[derive(Debug)]
pub struct CountingSource {
    dataset: Option<InMemoryDataset>,
    selects: AtomicUsize,
}

impl CountingSource {
    pub fn new(records: Vec<EmissionRecord>) -> Self {
        Self {
            dataset: Some(InMemoryDataset::new(records)),
            selects: AtomicUsize::new(0),
        }
    }

    /// A source whose every selection fails
    pub fn unavailable() -> Self {
        Self {
            dataset: None,
            selects: AtomicUsize::new(0),
        }
    }

    /// Number of times the dataset was consulted
    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmissionsSource for CountingSource {
    async fn select(
        &self,
        range: DateRange,
        facilities: &BTreeSet<String>,
    ) -> Result<Vec<EmissionRecord>, DatasetError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        match &self.dataset {
            Some(dataset) => dataset.select(range, facilities).await,
            None => Err(DatasetError::unavailable(self.name(), "dataset offline")),
        }
    }

    fn name(&self) -> &'static str {
        "CountingSource"
    }
}
