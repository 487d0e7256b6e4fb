// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-facility aggregation of emission rows
//!
//! [`aggregate`] is the single merge function for every source of rows:
//! fragments recovered from overlapping cache entries and raw records
//! selected from the dataset both go through it, so cached and freshly
//! computed results always share the same shape and ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Total emissions for a single facility
///
/// Serialized with the wire names `businessFacility` / `totalEmissions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsRow {
    pub business_facility: String,
    pub total_emissions: f64,
}

impl EmissionsRow {
    pub fn new(business_facility: impl Into<String>, total_emissions: f64) -> Self {
        Self {
            business_facility: business_facility.into(),
            total_emissions,
        }
    }
}

/// A row-like item that attributes an amount to a facility
pub trait FacilityAmount {
    /// Facility the amount belongs to
    fn facility(&self) -> &str;

    /// Amount contributed by this item
    fn amount(&self) -> f64;
}

impl FacilityAmount for EmissionsRow {
    fn facility(&self) -> &str {
        &self.business_facility
    }

    fn amount(&self) -> f64 {
        self.total_emissions
    }
}

impl<T: FacilityAmount + ?Sized> FacilityAmount for &T {
    fn facility(&self) -> &str {
        (**self).facility()
    }

    fn amount(&self) -> f64 {
        (**self).amount()
    }
}

/// Running per-facility sums for one aggregation pass
#[derive(Debug, Clone, Default)]
pub(crate) struct FacilityTotals {
    totals: BTreeMap<String, f64>,
}

impl FacilityTotals {
    /// Add one item's amount to its facility's running total
    pub(crate) fn add<R: FacilityAmount>(&mut self, row: R) {
        match self.totals.get_mut(row.facility()) {
            Some(total) => *total += row.amount(),
            None => {
                self.totals.insert(row.facility().to_owned(), row.amount());
            }
        }
    }

    /// Consume the accumulator, yielding rows sorted by facility name
    pub(crate) fn into_rows(self) -> Vec<EmissionsRow> {
        self.totals
            .into_iter()
            .map(|(business_facility, total_emissions)| EmissionsRow {
                business_facility,
                total_emissions,
            })
            .collect()
    }
}

impl<R: FacilityAmount> Extend<R> for FacilityTotals {
    fn extend<I: IntoIterator<Item = R>>(&mut self, iter: I) {
        for row in iter {
            self.add(row);
        }
    }
}

/// Merge rows into exactly one row per distinct facility
///
/// Each output total is the sum of every input amount for that facility.
/// Output is sorted by facility name, so a given input always yields the
/// same sequence.
///
/// # Examples
///
/// ```
/// use emissions_cache::{aggregate, EmissionsRow};
///
/// let merged = aggregate(&[
///     EmissionsRow::new("B", 1.5),
///     EmissionsRow::new("A", 10.0),
///     EmissionsRow::new("B", 2.5),
/// ]);
///
/// assert_eq!(merged, vec![EmissionsRow::new("A", 10.0), EmissionsRow::new("B", 4.0)]);
/// ```
pub fn aggregate<I>(rows: I) -> Vec<EmissionsRow>
where
    I: IntoIterator,
    I::Item: FacilityAmount,
{
    let mut totals = FacilityTotals::default();
    totals.extend(rows);
    totals.into_rows()
}
