// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Query orchestration
//!
//! [`EmissionsQueryService`] answers a query by walking the stages
//!
//! ```text
//! ExactLookup ─hit──────────────────────────────▶ Done
//!      │miss
//!      ▼
//! OverlapScan ─rows─▶ aggregate ─┐
//!      │empty                    ├─▶ Persist ─▶ Done
//!      ▼                         │
//! Fallback ─▶ compute_from_source┘
//! ```
//!
//! Nothing is retried. Store failures propagate as
//! [`QueryError::StoreUnavailable`] from whichever stage hit them, and a
//! cancelled request stops where it is with [`QueryError::Cancelled`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, Instrument};

use crate::aggregate::{aggregate, EmissionsRow};
use crate::cache::{CacheEntry, OverlapScanner};
use crate::config::EmissionsCacheConfig;
use crate::context::RequestContext;
use crate::dataset::{compute_from_source, EmissionsSource};
use crate::errors::QueryError;
use crate::key::{CacheKey, KeyDeriver};
use crate::query::{EmissionsQuery, QueryRequest};
use crate::spans;
use crate::store::{CacheStore, KeyValueStore};

/// Orchestrator stage, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ExactLookup,
    OverlapScan,
    Fallback,
    Persist,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ExactLookup => "exact_lookup",
            Stage::OverlapScan => "overlap_scan",
            Stage::Fallback => "fallback",
            Stage::Persist => "persist",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a query was answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Returned the entry stored under the exact key
    ExactHit,
    /// Aggregated rows from overlapping entries
    Overlap {
        /// Keys of the contributing entries
        fragments: Vec<CacheKey>,
        /// Corrupt entries skipped during the scan
        skipped: usize,
    },
    /// Computed from the dataset
    Computed,
}

/// Result of one query together with how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub key: CacheKey,
    pub results: Vec<EmissionsRow>,
    pub resolution: Resolution,
}

/// Answers emissions queries from the cache where possible
///
/// Holds only shared handles and immutable configuration, so one service can
/// serve any number of concurrent queries.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use emissions_cache::{EmissionsCacheConfig, EmissionsQueryService, InMemoryDataset, QueryRequest};
/// use emissions_cache::store::MemoryStore;
///
/// let service = EmissionsQueryService::new(
///     Arc::new(MemoryStore::new()),
///     Arc::new(InMemoryDataset::from_json_file("emissions.json").await?),
///     EmissionsCacheConfig::default(),
/// );
///
/// let rows = service
///     .query(&QueryRequest::new("2023-01-01", "2023-06-30", ["GreenEat Changi"]))
///     .await?;
/// ```
pub struct EmissionsQueryService {
    store: CacheStore,
    source: Arc<dyn EmissionsSource>,
    keys: KeyDeriver,
    scanner: OverlapScanner,
    config: EmissionsCacheConfig,
}

impl fmt::Debug for EmissionsQueryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionsQueryService")
            .field("store", &self.store)
            .field("source", &self.source.name())
            .field("config", &self.config)
            .finish()
    }
}

impl EmissionsQueryService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn EmissionsSource>,
        config: EmissionsCacheConfig,
    ) -> Self {
        let store = CacheStore::new(store, config.store_timeout)
            .with_scan_concurrency(config.effective_scan_concurrency());

        info!(
            backend = store.backend().name(),
            source = source.name(),
            namespace = %config.namespace,
            overlap_policy = %config.overlap_policy,
            "Created emissions query service"
        );

        Self {
            store,
            source,
            keys: KeyDeriver::new(config.namespace.clone()),
            scanner: OverlapScanner::new(config.overlap_policy),
            config,
        }
    }

    pub fn config(&self) -> &EmissionsCacheConfig {
        &self.config
    }

    pub fn key_deriver(&self) -> &KeyDeriver {
        &self.keys
    }

    /// The typed store adapter the service reads and writes through
    pub fn cache_store(&self) -> &CacheStore {
        &self.store
    }

    /// Answer `request` with no deadline or cancellation
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<EmissionsRow>, QueryError> {
        let outcome = self.query_with_context(&RequestContext::new(), request).await?;
        Ok(outcome.results)
    }

    /// Validate `request` and answer it under `ctx`
    ///
    /// Validation happens before any store access; an invalid request
    /// touches neither the cache nor the dataset.
    pub async fn query_with_context(
        &self,
        ctx: &RequestContext,
        request: &QueryRequest,
    ) -> Result<QueryOutcome, QueryError> {
        let query = request.validate()?;
        self.execute(ctx, &query).await
    }

    /// Answer an already validated query
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        query: &EmissionsQuery,
    ) -> Result<QueryOutcome, QueryError> {
        let key = self.keys.derive(query)?;
        let span = spans::execute_query(query.range(), query.facilities().len(), &key);

        async move {
            debug!(stage = %Stage::ExactLookup, "Looking up exact key");
            let hit = self
                .store
                .get(ctx, &key)
                .instrument(spans::exact_lookup(&key))
                .await?;
            if let Some(entry) = hit {
                info!(stage = %Stage::Done, rows = entry.results.len(), "Exact cache hit");
                return Ok(QueryOutcome {
                    key,
                    results: entry.results,
                    resolution: Resolution::ExactHit,
                });
            }

            debug!(stage = %Stage::OverlapScan, policy = %self.scanner.policy(), "Exact key missed");
            let prefix = self.keys.prefix();
            let found = self
                .scanner
                .find_overlapping(ctx, query, &self.store, &prefix)
                .instrument(spans::overlap_scan(&prefix))
                .await?;

            let (results, resolution) = if found.is_empty() {
                debug!(stage = %Stage::Fallback, "No overlapping entries, computing from dataset");
                let results = compute_from_source(
                    ctx,
                    self.source.as_ref(),
                    query,
                    self.config.dataset_timeout,
                )
                .await?;
                (results, Resolution::Computed)
            } else {
                let results = aggregate(&found.rows);
                (
                    results,
                    Resolution::Overlap {
                        fragments: found.fragments,
                        skipped: found.skipped,
                    },
                )
            };

            debug!(stage = %Stage::Persist, rows = results.len(), "Persisting result");
            let entry = CacheEntry::for_query(query, results);
            self.store
                .set(ctx, &key, &entry)
                .instrument(spans::persist(&key, entry.results.len()))
                .await?;

            info!(
                stage = %Stage::Done,
                rows = entry.results.len(),
                resolution = resolution_name(&resolution),
                "Query answered"
            );
            Ok(QueryOutcome {
                key,
                results: entry.results,
                resolution,
            })
        }
        .instrument(span)
        .await
    }
}

fn resolution_name(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::ExactHit => "exact_hit",
        Resolution::Overlap { .. } => "overlap",
        Resolution::Computed => "computed",
    }
}
