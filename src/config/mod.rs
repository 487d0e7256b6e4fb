// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the emissions query service
//!
//! Controls key namespacing, store and dataset time budgets, the overlap
//! reuse policy, and scan fan-out.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use emissions_cache::EmissionsCacheConfig;
//!
//! let config = EmissionsCacheConfig::default();
//! assert_eq!(config.namespace, "emissions");
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use emissions_cache::{EmissionsCacheConfigBuilder, OverlapPolicy};
//! use std::time::Duration;
//!
//! let config = EmissionsCacheConfigBuilder::with_defaults()
//!     .store_timeout(Duration::from_millis(250))
//!     .overlap_policy(OverlapPolicy::FacilityClipped)
//!     .build();
//! assert_eq!(config.overlap_policy, OverlapPolicy::FacilityClipped);
//! ```

use std::time::Duration;

use crate::cache::OverlapPolicy;

pub mod constants;

use constants::{
    DEFAULT_DATASET_TIMEOUT, DEFAULT_NAMESPACE, DEFAULT_SCAN_CONCURRENCY, DEFAULT_STORE_TIMEOUT,
};

/// Configuration for the emissions query service
///
/// Use [`EmissionsCacheConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionsCacheConfig {
    /// Key namespace, without the trailing `:`
    /// Default: `emissions`
    pub namespace: String,

    /// Budget for each individual store call
    /// Default: 5 seconds
    pub store_timeout: Duration,

    /// Budget for a dataset fallback computation
    /// Default: 30 seconds
    pub dataset_timeout: Duration,

    /// How overlapping cache entries are reused
    /// Default: [`OverlapPolicy::Coarse`]
    pub overlap_policy: OverlapPolicy,

    /// Entry fetches in flight during an overlap scan (at least 1)
    /// Default: 16
    pub scan_concurrency: usize,
}

impl Default for EmissionsCacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            dataset_timeout: DEFAULT_DATASET_TIMEOUT,
            overlap_policy: OverlapPolicy::default(),
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }
}

impl EmissionsCacheConfig {
    /// Exact-or-compute configuration: overlap reuse disabled
    ///
    /// Every answer is either a stored exact match or a fresh dataset
    /// computation, so totals are always exact.
    pub fn minimal() -> Self {
        Self {
            overlap_policy: OverlapPolicy::Disabled,
            scan_concurrency: 1,
            ..Self::default()
        }
    }

    /// Effective scan fan-out, never below one
    pub fn effective_scan_concurrency(&self) -> usize {
        self.scan_concurrency.max(1)
    }
}

/// Builder for [`EmissionsCacheConfig`]
///
/// # Example
///
/// ```rust
/// use emissions_cache::EmissionsCacheConfigBuilder;
/// use std::time::Duration;
///
/// let config = EmissionsCacheConfigBuilder::new()
///     .namespace("scope1")
///     .dataset_timeout(Duration::from_secs(5))
///     .scan_concurrency(4)
///     .build();
///
/// assert_eq!(config.namespace, "scope1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmissionsCacheConfigBuilder {
    config: EmissionsCacheConfig,
}

impl EmissionsCacheConfigBuilder {
    /// Start from [`EmissionsCacheConfig::default`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`EmissionsCacheConfig::default`]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Start from [`EmissionsCacheConfig::minimal`]
    pub fn minimal() -> Self {
        Self {
            config: EmissionsCacheConfig::minimal(),
        }
    }

    /// Set the key namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the per-call store budget
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    /// Set the dataset fallback budget
    pub fn dataset_timeout(mut self, timeout: Duration) -> Self {
        self.config.dataset_timeout = timeout;
        self
    }

    /// Set the overlap reuse policy
    pub fn overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.config.overlap_policy = policy;
        self
    }

    /// Set the number of concurrent entry fetches during a scan
    pub fn scan_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scan_concurrency = concurrency;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EmissionsCacheConfig {
        self.config
    }
}
