// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Default values for the emissions cache
//!
//! This module centralizes magic constants used throughout the crate.

use std::time::Duration;

/// Namespace every cache key is written under (`emissions:<digest>`)
pub const DEFAULT_NAMESPACE: &str = "emissions";

/// Per-operation budget for a single store call (get, set or key scan)
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for one dataset fallback computation
pub const DEFAULT_DATASET_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of entry fetches kept in flight during an overlap scan
pub const DEFAULT_SCAN_CONCURRENCY: usize = 16;

/// Environment variables read by the binary
pub mod env {
    /// Path to the JSON dataset file
    pub const DATASET: &str = "EMISSIONS_DATASET";
    /// Cache backend: `memory`, `disk` or `none`
    pub const CACHE_BACKEND: &str = "EMISSIONS_CACHE_BACKEND";
    /// Path of the disk cache file
    pub const CACHE_PATH: &str = "EMISSIONS_CACHE_PATH";
    /// Key namespace
    pub const NAMESPACE: &str = "EMISSIONS_NAMESPACE";
    /// Overlap policy: `coarse`, `facility-clipped` or `disabled`
    pub const OVERLAP_POLICY: &str = "EMISSIONS_OVERLAP_POLICY";
    /// Store timeout in milliseconds
    pub const STORE_TIMEOUT_MS: &str = "EMISSIONS_STORE_TIMEOUT_MS";
    /// Dataset timeout in milliseconds
    pub const DATASET_TIMEOUT_MS: &str = "EMISSIONS_DATASET_TIMEOUT_MS";
    /// Log output format: `pretty` (default) or `json`
    pub const LOG_FORMAT: &str = "EMISSIONS_LOG_FORMAT";
}

/// Default disk cache location used by the binary
pub const DEFAULT_CACHE_PATH: &str = "emissions-cache.json";
