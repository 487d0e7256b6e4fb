// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Query types: the inbound request shape and its validated, normalized form.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// A range of calendar dates with start and end inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a date range, rejecting `start > end`
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day of the range
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days covered (inclusive)
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Check whether two inclusive ranges share at least one day.
    ///
    /// Commutative: `a.overlaps(&b) == b.overlaps(&a)`.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Inbound query as received from the request layer.
///
/// Field names follow the wire format (`startDate`, `endDate`,
/// `businessFacility`). Dates stay as strings until [`QueryRequest::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub business_facility: Vec<String>,
}

impl QueryRequest {
    /// Build a request from its parts
    pub fn new<I, S>(start_date: impl Into<String>, end_date: impl Into<String>, facilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start_date: Some(start_date.into()),
            end_date: Some(end_date.into()),
            business_facility: facilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate and normalize into an [`EmissionsQuery`]
    pub fn validate(&self) -> Result<EmissionsQuery, ValidationError> {
        let start = required_date("startDate", self.start_date.as_deref())?;
        let end = required_date("endDate", self.end_date.as_deref())?;
        let range = DateRange::try_new(start, end)?;
        Ok(EmissionsQuery::new(range, self.business_facility.iter().cloned()))
    }
}

impl TryFrom<&QueryRequest> for EmissionsQuery {
    type Error = ValidationError;

    fn try_from(request: &QueryRequest) -> Result<Self, Self::Error> {
        request.validate()
    }
}

fn required_date(field: &'static str, value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::missing_field(field))?;
    parse_iso_date(raw).ok_or_else(|| ValidationError::invalid_date(field, raw))
}

/// Parse an ISO 8601 date, or a date-time truncated to its calendar date.
///
/// Accepts `2023-01-05`, `2023-01-05T10:30:00`, `2023-01-05 10:30:00` and
/// RFC 3339 timestamps with an offset (the local calendar date is kept).
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|ts| ts.date())
}

/// A validated, normalized query: an inclusive date range and a facility set.
///
/// Facilities are held in a `BTreeSet`, so ordering and duplicates in the
/// inbound request never affect the query's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmissionsQuery {
    range: DateRange,
    facilities: BTreeSet<String>,
}

impl EmissionsQuery {
    /// Create a query over `range` for the given facilities
    pub fn new<I, S>(range: DateRange, facilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            range,
            facilities: facilities.into_iter().map(Into::into).collect(),
        }
    }

    /// The requested date range
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// The requested facilities, sorted and de-duplicated
    pub fn facilities(&self) -> &BTreeSet<String> {
        &self.facilities
    }

    /// Whether any facility was requested
    pub fn has_facilities(&self) -> bool {
        !self.facilities.is_empty()
    }
}
