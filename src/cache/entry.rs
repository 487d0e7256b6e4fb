// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Stored cache entries and their JSON wire encoding
//!
//! ```text
//! {
//!   "start_date": "2023-01-01",
//!   "end_date": "2023-01-31",
//!   "facilities": ["A", "B"],
//!   "results": [{"businessFacility": "A", "totalEmissions": 10.0}]
//! }
//! ```

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::EmissionsRow;
use crate::errors::CorruptEntryError;
use crate::query::{DateRange, EmissionsQuery};

/// A previously computed query result, as stored under its exact key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Facilities the entry was computed for (serialized sorted)
    pub facilities: BTreeSet<String>,
    pub results: Vec<EmissionsRow>,
}

impl CacheEntry {
    /// Build the entry recording `results` as the answer to `query`
    pub fn for_query(query: &EmissionsQuery, results: Vec<EmissionsRow>) -> Self {
        let range = query.range();
        Self {
            start_date: range.start(),
            end_date: range.end(),
            facilities: query.facilities().clone(),
            results,
        }
    }

    /// The entry's date range, if its bounds are ordered
    pub fn range(&self) -> Option<DateRange> {
        DateRange::try_new(self.start_date, self.end_date).ok()
    }

    /// Whether this entry shares at least one facility with `facilities`
    pub fn shares_facility_with(&self, facilities: &BTreeSet<String>) -> bool {
        !self.facilities.is_disjoint(facilities)
    }

    /// Encode as the JSON wire payload
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode the payload stored under `key`
    ///
    /// Fails with [`CorruptEntryError`] when the bytes are not a cache entry
    /// or the decoded range is inverted.
    pub fn decode(key: &str, bytes: &[u8]) -> Result<Self, CorruptEntryError> {
        let entry: CacheEntry =
            serde_json::from_slice(bytes).map_err(|source| CorruptEntryError::Undecodable {
                key: key.to_owned(),
                source,
            })?;

        if entry.start_date > entry.end_date {
            return Err(CorruptEntryError::Invalid {
                key: key.to_owned(),
                reason: format!(
                    "start_date {} is after end_date {}",
                    entry.start_date, entry.end_date
                ),
            });
        }

        Ok(entry)
    }
}
