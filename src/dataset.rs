// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Authoritative emissions dataset and the fallback computation over it
//!
//! The dataset is a flat table of transactions, one row per emission item.
//! Rows are read from JSON using the column names of the source export
//! (`TRANSACTION DATE`, `Business Facility`, `CO2_ITEM`); snake_case and
//! camelCase names are accepted as well.
//!
//! ```text
//! [
//!   {"TRANSACTION DATE": "15/01/23", "Business Facility": "GreenEat Changi", "CO2_ITEM": 12.5},
//!   {"transactionDate": "2023-01-16", "businessFacility": "GreenEat Orchard", "co2Item": 3.0}
//! ]
//! ```

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, Instrument};

use crate::aggregate::{aggregate, EmissionsRow, FacilityAmount};
use crate::context::{Interrupted, RequestContext};
use crate::errors::{DatasetError, QueryError};
use crate::query::{parse_iso_date, DateRange, EmissionsQuery};
use crate::spans;

/// Day-first short date used by the source export
const EXPORT_DATE_FORMAT: &str = "%d/%m/%y";

/// One dataset row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    #[serde(
        rename = "TRANSACTION DATE",
        alias = "transaction_date",
        alias = "transactionDate",
        deserialize_with = "deserialize_transaction_date"
    )]
    pub transaction_date: NaiveDate,
    #[serde(
        rename = "Business Facility",
        alias = "business_facility",
        alias = "businessFacility"
    )]
    pub business_facility: String,
    #[serde(rename = "CO2_ITEM", alias = "co2_item", alias = "co2Item")]
    pub co2_item: f64,
}

impl EmissionRecord {
    pub fn new(
        transaction_date: NaiveDate,
        business_facility: impl Into<String>,
        co2_item: f64,
    ) -> Self {
        Self {
            transaction_date,
            business_facility: business_facility.into(),
            co2_item,
        }
    }
}

impl FacilityAmount for EmissionRecord {
    fn facility(&self) -> &str {
        &self.business_facility
    }

    fn amount(&self) -> f64 {
        self.co2_item
    }
}

fn deserialize_transaction_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_date(&raw)
        .or_else(|| NaiveDate::parse_from_str(raw.trim(), EXPORT_DATE_FORMAT).ok())
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized transaction date: {raw}")))
}

/// Source of dataset rows
///
/// Implementations return every row whose transaction date lies within
/// `range` (inclusive) and whose facility is in `facilities`.
#[async_trait]
pub trait EmissionsSource: Send + Sync {
    async fn select(
        &self,
        range: DateRange,
        facilities: &BTreeSet<String>,
    ) -> Result<Vec<EmissionRecord>, DatasetError>;

    /// Source name used in logs and errors
    fn name(&self) -> &'static str;
}

/// Dataset held entirely in memory, ordered by transaction date
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    records: Vec<EmissionRecord>,
}

impl InMemoryDataset {
    pub fn new(mut records: Vec<EmissionRecord>) -> Self {
        records.sort_by_key(|r| r.transaction_date);
        Self { records }
    }

    /// Read a JSON array of rows
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        let records: Vec<EmissionRecord> = serde_json::from_reader(reader)?;
        Ok(Self::new(records))
    }

    /// Load a JSON row file
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Load`] if the file cannot be read or parsed.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DatasetError::load(path.display().to_string(), e))?;
        let dataset = Self::from_json_reader(bytes.as_slice())
            .map_err(|e| DatasetError::load(path.display().to_string(), e))?;

        info!(path = %path.display(), records = dataset.len(), "Loaded emissions dataset");
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows dated within `range`, in date order
    fn within(&self, range: DateRange) -> &[EmissionRecord] {
        let lo = self
            .records
            .partition_point(|r| r.transaction_date < range.start());
        let hi = self
            .records
            .partition_point(|r| r.transaction_date <= range.end());
        &self.records[lo..hi]
    }
}

#[async_trait]
impl EmissionsSource for InMemoryDataset {
    async fn select(
        &self,
        range: DateRange,
        facilities: &BTreeSet<String>,
    ) -> Result<Vec<EmissionRecord>, DatasetError> {
        Ok(self
            .within(range)
            .iter()
            .filter(|r| facilities.contains(&r.business_facility))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "InMemoryDataset"
    }
}

/// Compute the aggregate for `query` directly from `source`
///
/// A query with no facilities matches no rows, so the source is not
/// consulted. The selection is bounded by `timeout` and by `ctx`.
pub async fn compute_from_source(
    ctx: &RequestContext,
    source: &dyn EmissionsSource,
    query: &EmissionsQuery,
    timeout: Duration,
) -> Result<Vec<EmissionsRow>, QueryError> {
    let range = query.range();

    async move {
        if !query.has_facilities() {
            debug!("No facilities requested, result is empty");
            return Ok(Vec::new());
        }

        let records = ctx
            .run(timeout, source.select(range, query.facilities()))
            .await
            .map_err(|interrupted| match interrupted {
                Interrupted::Cancelled => QueryError::cancelled("compute"),
                Interrupted::DeadlineExceeded(elapsed) => DatasetError::Timeout {
                    source_name: source.name(),
                    elapsed,
                }
                .into(),
            })??;

        let results = aggregate(&records);
        debug!(
            records = records.len(),
            facilities = results.len(),
            "Aggregated dataset rows"
        );
        Ok(results)
    }
    .instrument(spans::compute_from_source(source.name(), range))
    .await
}
