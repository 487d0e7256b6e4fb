// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Span creation helpers for emissions cache operations.
//!
//! Telemetry is kept out of business logic: instead of `#[instrument]`
//! attributes, each instrumented operation has a span helper here and
//! attaches it with [`tracing::Instrument`].
//!
//! ```rust,ignore
//! async fn my_operation(&self, query: &EmissionsQuery) -> Result<T, QueryError> {
//!     async move {
//!         // Business logic here
//!     }
//!     .instrument(spans::my_operation(query.range()))
//!     .await
//! }
//! ```

use tracing::{Level, Span};

use crate::key::CacheKey;
use crate::query::DateRange;

/// Create span for answering one emissions query.
///
/// Parent: None (root span for this operation)
/// Children: exact_lookup, overlap_scan, compute_from_source, persist
#[inline]
pub(crate) fn execute_query(range: DateRange, facilities: usize, key: &CacheKey) -> Span {
    tracing::span!(
        Level::INFO,
        "emissions_cache.execute_query",
        start_date = %range.start(),
        end_date = %range.end(),
        days = range.num_days(),
        facilities = facilities,
        key = %key,
    )
}

/// Create span for the exact-key cache lookup.
#[inline]
pub(crate) fn exact_lookup(key: &CacheKey) -> Span {
    tracing::debug_span!("emissions_cache.exact_lookup", key = %key)
}

/// Create span for scanning the namespace for overlapping entries.
///
/// Parent: execute_query span
#[inline]
pub(crate) fn overlap_scan(prefix: &str) -> Span {
    tracing::debug_span!("emissions_cache.overlap_scan", prefix = %prefix)
}

/// Create span for computing a result from the dataset.
///
/// Parent: execute_query span
#[inline]
pub(crate) fn compute_from_source(source: &'static str, range: DateRange) -> Span {
    tracing::span!(
        Level::INFO,
        "emissions_cache.compute_from_source",
        source = source,
        start_date = %range.start(),
        end_date = %range.end(),
    )
}

#[inline]
pub(crate) fn persist(key: &CacheKey, rows: usize) -> Span {
    tracing::debug_span!("emissions_cache.persist", key = %key, rows = rows)
}
