// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the authoritative dataset.

use std::time::Duration;

/// Errors from computing an aggregate directly against the dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// The source could not serve the selection.
    #[error("Dataset `{source_name}` unavailable: {details}")]
    Unavailable {
        /// Source name, as reported by `EmissionsSource::name`
        source_name: &'static str,
        /// Human-readable failure description
        details: String,
    },

    /// The selection did not complete within its time budget.
    #[error("Dataset `{source_name}` timed out after {elapsed:?}")]
    Timeout {
        /// Source name
        source_name: &'static str,
        /// Budget that was exceeded
        elapsed: Duration,
    },

    /// A dataset file could not be read or parsed.
    #[error("Failed to load dataset from {path}: {details}")]
    Load {
        /// Path of the dataset file
        path: String,
        /// Details about the failure
        details: String,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DatasetError {
    /// Create an `Unavailable` error.
    pub fn unavailable(source_name: &'static str, details: impl Into<String>) -> Self {
        DatasetError::Unavailable {
            source_name,
            details: details.into(),
        }
    }

    /// Create a `Load` error from any underlying error.
    pub fn load(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DatasetError::Load {
            path: path.into(),
            details: source.to_string(),
            source: Box::new(source),
        }
    }
}
