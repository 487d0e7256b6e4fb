// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! No-operation store that disables caching entirely

use async_trait::async_trait;

use super::{KeyValueStore, StoreStats};
use crate::errors::StoreError;

/// A no-operation store that disables caching entirely
///
/// Reads always miss, writes are dropped and scans are empty, so every
/// query is computed from the dataset.
///
/// # Examples
///
/// ```rust,ignore
/// use emissions_cache::{EmissionsQueryService, store::NoOpStore};
/// use std::sync::Arc;
///
/// let service = EmissionsQueryService::new(Arc::new(NoOpStore), dataset, config);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStore;

#[async_trait]
impl KeyValueStore for NoOpStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn scan_keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }

    async fn stats(&self) -> StoreStats {
        StoreStats::default()
    }

    fn name(&self) -> &'static str {
        "NoOpStore"
    }
}
