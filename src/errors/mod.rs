// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the emissions cache.
//!
//! This module follows a hybrid approach:
//!
//! - **Module-specific errors** for fine-grained handling ([`ValidationError`],
//!   [`StoreError`], [`CorruptEntryError`], [`DatasetError`])
//! - **Unified error type** ([`QueryError`]) returned by the query service,
//!   with [`QueryError::kind`] for programmatic discrimination
//!
//! # Propagation
//!
//! | Class | Type | Handling |
//! |-------|------|----------|
//! | Validation | [`ValidationError`] | client failure, raised before any store access |
//! | Store unavailable | [`StoreError`] | retryable server failure, never turned into a fallback |
//! | Corrupt entry | [`CorruptEntryError`] | skipped and logged during scans |
//! | Dataset compute | [`DatasetError`] | server failure |
//!
//! # Examples
//!
//! ```rust,ignore
//! use emissions_cache::{ErrorKind, QueryError};
//!
//! match service.query(request).await {
//!     Ok(rows) => println!("{rows:?}"),
//!     Err(e) if e.kind() == ErrorKind::Validation => eprintln!("bad request: {e}"),
//!     Err(e) if e.is_retryable() => eprintln!("try again later: {e}"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! ```

mod dataset;
mod store;
mod validation;

pub use dataset::DatasetError;
pub use store::{CorruptEntryError, StoreError};
pub use validation::ValidationError;

/// Coarse classification of a [`QueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed inbound query
    Validation,
    /// Cache store unreachable or timed out
    StoreUnavailable,
    /// Dataset fallback failed
    DatasetCompute,
    /// The request context was cancelled
    Cancelled,
}

/// Unified error type returned by the query service.
///
/// Module-specific errors convert into `QueryError` via `From`, so `?`
/// propagates them naturally.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The inbound query failed validation.
    #[error("Invalid query: {0}")]
    Validation(#[from] ValidationError),

    /// The cache store failed; the request may succeed on retry.
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The dataset fallback computation failed.
    #[error("Dataset computation failed: {0}")]
    DatasetCompute(#[from] DatasetError),

    /// The request was cancelled before it completed.
    #[error("Query cancelled during {stage}")]
    Cancelled {
        /// Orchestrator stage that observed the cancellation
        stage: &'static str,
    },
}

impl QueryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::Validation,
            QueryError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            QueryError::DatasetCompute(_) => ErrorKind::DatasetCompute,
            QueryError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether the caller may retry the same query.
    ///
    /// Store failures are transient by definition; dataset timeouts are too.
    pub fn is_retryable(&self) -> bool {
        match self {
            QueryError::StoreUnavailable(_) => true,
            QueryError::DatasetCompute(DatasetError::Timeout { .. }) => true,
            QueryError::DatasetCompute(DatasetError::Unavailable { .. }) => true,
            QueryError::DatasetCompute(DatasetError::Load { .. }) => false,
            QueryError::Validation(_) | QueryError::Cancelled { .. } => false,
        }
    }

    /// Whether the failure lies with the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }

    pub(crate) fn cancelled(stage: &'static str) -> Self {
        QueryError::Cancelled { stage }
    }
}
