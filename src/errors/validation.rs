// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for inbound query validation.

use chrono::NaiveDate;

/// Errors raised while turning an inbound request into an [`EmissionsQuery`].
///
/// Validation runs before any store access, so these errors never touch
/// the cache and are never cached themselves.
///
/// [`EmissionsQuery`]: crate::EmissionsQuery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("Missing required field `{field}`")]
    MissingField {
        /// Wire name of the missing field
        field: &'static str,
    },

    /// A date field could not be parsed as an ISO 8601 date.
    #[error("Invalid date in `{field}`: {value:?} is not an ISO 8601 date")]
    InvalidDate {
        /// Wire name of the offending field
        field: &'static str,
        /// The raw value received
        value: String,
    },

    /// The start of the range lies after its end.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvertedRange {
        /// Requested start date
        start: NaiveDate,
        /// Requested end date
        end: NaiveDate,
    },
}

impl ValidationError {
    /// Create a `MissingField` error.
    pub fn missing_field(field: &'static str) -> Self {
        ValidationError::MissingField { field }
    }

    /// Create an `InvalidDate` error.
    pub fn invalid_date(field: &'static str, value: impl Into<String>) -> Self {
        ValidationError::InvalidDate {
            field,
            value: value.into(),
        }
    }
}
