// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Overlap detection across cached entries
//!
//! An entry overlaps a query when both hold:
//!
//! - **Date overlap**: `!(entry.end < query.start || entry.start > query.end)`,
//!   inclusive on both sides
//! - **Facility overlap**: the facility sets intersect
//!
//! # Correctness
//!
//! Reusing a fragment is only exact when the fragment covers the same days
//! and facilities as the query. With [`OverlapPolicy::Coarse`] any overlap
//! pulls in every row of the entry, so totals can include days outside the
//! requested range, facilities that were not requested, and the same days
//! counted twice when fragments overlap each other. [`OverlapPolicy::FacilityClipped`]
//! removes the foreign facilities but still carries the date mismatch.
//! [`OverlapPolicy::Disabled`] is the only exact mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use crate::aggregate::EmissionsRow;
use crate::context::RequestContext;
use crate::errors::QueryError;
use crate::key::CacheKey;
use crate::query::EmissionsQuery;
use crate::store::CacheStore;

/// How rows from overlapping cache entries are reused
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Any overlap reuses every row of the entry
    #[default]
    Coarse,
    /// Overlapping entries contribute only rows for requested facilities
    FacilityClipped,
    /// Never reuse partial matches; exact hit or dataset computation only
    Disabled,
}

impl OverlapPolicy {
    /// Policy name as accepted by [`FromStr`]
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapPolicy::Coarse => "coarse",
            OverlapPolicy::FacilityClipped => "facility-clipped",
            OverlapPolicy::Disabled => "disabled",
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => Ok(OverlapPolicy::Coarse),
            "facility-clipped" | "facility_clipped" | "clipped" => {
                Ok(OverlapPolicy::FacilityClipped)
            }
            "disabled" | "off" | "none" => Ok(OverlapPolicy::Disabled),
            other => Err(format!("unknown overlap policy: {other}")),
        }
    }
}

/// Whether `entry` overlaps `query` in both dates and facilities
pub fn entry_overlaps(entry: &CacheEntry, query: &EmissionsQuery) -> bool {
    let Some(entry_range) = entry.range() else {
        return false;
    };
    entry_range.overlaps(&query.range()) && entry.shares_facility_with(query.facilities())
}

/// Raw rows gathered from every qualifying entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapMatch {
    /// Unaggregated rows, in key order then entry order
    pub rows: Vec<EmissionsRow>,
    /// Keys of the entries that contributed rows
    pub fragments: Vec<CacheKey>,
    /// Number of corrupt entries skipped during the scan
    pub skipped: usize,
}

impl OverlapMatch {
    /// True when no entry contributed a row
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Walks the cache namespace looking for entries that overlap a query
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapScanner {
    policy: OverlapPolicy,
}

impl OverlapScanner {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Rows `entry` contributes to `query` under this policy
    fn select_rows<'a>(
        &self,
        entry: &'a CacheEntry,
        query: &'a EmissionsQuery,
    ) -> impl Iterator<Item = &'a EmissionsRow> + 'a {
        let clip = self.policy == OverlapPolicy::FacilityClipped;
        entry
            .results
            .iter()
            .filter(move |row| !clip || query.facilities().contains(&row.business_facility))
    }

    /// Collect the raw rows of every cached entry overlapping `query`
    ///
    /// Scans every key under `prefix`. Corrupt entries are skipped and
    /// logged. Store failures and cancellation abort the scan; partial rows
    /// are discarded.
    pub async fn find_overlapping(
        &self,
        ctx: &RequestContext,
        query: &EmissionsQuery,
        store: &CacheStore,
        prefix: &str,
    ) -> Result<OverlapMatch, QueryError> {
        if self.policy == OverlapPolicy::Disabled {
            debug!("Overlap reuse disabled, skipping scan");
            return Ok(OverlapMatch::default());
        }

        let scan = store.scan(ctx, prefix).await?;
        let mut found = OverlapMatch {
            skipped: scan.corrupt.len(),
            ..OverlapMatch::default()
        };

        for corrupt in &scan.corrupt {
            warn!(key = %corrupt.key(), error = %corrupt, "Skipping corrupt cache entry");
        }

        for (key, entry) in &scan.entries {
            if !entry_overlaps(entry, query) {
                continue;
            }

            let before = found.rows.len();
            found.rows.extend(self.select_rows(entry, query).cloned());
            if found.rows.len() > before {
                debug!(
                    key = %key,
                    rows = found.rows.len() - before,
                    entry_start = %entry.start_date,
                    entry_end = %entry.end_date,
                    "Reusing overlapping cache entry"
                );
                found.fragments.push(key.clone());
            }
        }

        debug!(
            scanned = scan.entries.len(),
            fragments = found.fragments.len(),
            rows = found.rows.len(),
            skipped = found.skipped,
            policy = %self.policy,
            "Overlap scan complete"
        );

        Ok(found)
    }
}
