// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for the cache store adapter and its backends.
//!
//! Two families live here:
//!
//! - [`StoreError`] for infrastructure failures (store unreachable, timed out,
//!   unwritable). These always propagate to the caller.
//! - [`CorruptEntryError`] for a single stored value that cannot be decoded.
//!   Scans recover from these locally by skipping the entry.

use std::time::Duration;

/// Infrastructure failure while talking to the key-value store.
///
/// The orchestrator never treats a `StoreError` as "no cached data": a broken
/// cache is reported, not papered over with a full dataset computation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("Store `{backend}` unavailable during {operation}: {details}")]
    Unavailable {
        /// Backend name, as reported by `KeyValueStore::name`
        backend: &'static str,
        /// Operation that failed (`get`, `set`, `scan_keys`)
        operation: &'static str,
        /// Human-readable failure description
        details: String,
    },

    /// The operation did not complete within its time budget.
    #[error("Store `{backend}` timed out during {operation} after {elapsed:?}")]
    Timeout {
        /// Backend name
        backend: &'static str,
        /// Operation that timed out
        operation: &'static str,
        /// Budget that was exceeded
        elapsed: Duration,
    },

    /// The value handed to `set` cannot be represented by this backend.
    #[error("Store `{backend}` rejected value for key {key}: {details}")]
    InvalidValue {
        /// Backend name
        backend: &'static str,
        /// Key being written
        key: String,
        /// Why the value was rejected
        details: String,
    },

    /// Filesystem error from a disk-backed store.
    #[error("Store I/O error at {path}: {details}")]
    Io {
        /// Path of the file involved
        path: String,
        /// Details about the failure
        details: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A store-level file or payload could not be (de)serialized.
    #[error("Store serialization error: {details}")]
    Serialization {
        /// Details about the failure
        details: String,
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create an `Unavailable` error.
    pub fn unavailable(
        backend: &'static str,
        operation: &'static str,
        details: impl Into<String>,
    ) -> Self {
        StoreError::Unavailable {
            backend,
            operation,
            details: details.into(),
        }
    }

    /// Create a `Timeout` error.
    pub fn timeout(backend: &'static str, operation: &'static str, elapsed: Duration) -> Self {
        StoreError::Timeout {
            backend,
            operation,
            elapsed,
        }
    }

    /// Create an `Io` error from an I/O error and the path involved.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            details: source.to_string(),
            source,
        }
    }

    /// Create a `Serialization` error from a serde_json error.
    pub fn serialization(source: serde_json::Error) -> Self {
        StoreError::Serialization {
            details: source.to_string(),
            source,
        }
    }
}

/// A stored value under a namespaced key that could not be decoded into a
/// cache entry.
#[derive(Debug, thiserror::Error)]
pub enum CorruptEntryError {
    /// The bytes are not a valid cache entry payload.
    #[error("Corrupt cache entry under {key}: {source}")]
    Undecodable {
        /// Key holding the corrupt value
        key: String,
        /// The decode failure
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but violates the entry invariants.
    #[error("Corrupt cache entry under {key}: {reason}")]
    Invalid {
        /// Key holding the corrupt value
        key: String,
        /// Invariant that does not hold
        reason: String,
    },
}

impl CorruptEntryError {
    /// Key of the offending entry.
    pub fn key(&self) -> &str {
        match self {
            CorruptEntryError::Undecodable { key, .. } | CorruptEntryError::Invalid { key, .. } => {
                key
            }
        }
    }
}
