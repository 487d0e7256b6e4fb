// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Range-aggregation cache for facility emissions
//!
//! Answers "total emissions per facility between two dates" from previously
//! computed results where it can, and from the authoritative dataset where
//! it cannot. Every computed answer is written back under a deterministic
//! key so that repeating a query is a single store lookup.
//!
//! The cache store and the dataset are injected: see
//! [`store::KeyValueStore`] and [`EmissionsSource`].

mod aggregate;
pub mod bootstrap;
pub mod cache;
mod config;
mod context;
mod dataset;
mod errors;
mod key;
mod query;
mod service;
mod spans;
pub mod store;

pub use aggregate::{aggregate, EmissionsRow, FacilityAmount};
pub use cache::{CacheEntry, OverlapPolicy};
pub use config::constants;
pub use config::{EmissionsCacheConfig, EmissionsCacheConfigBuilder};
pub use context::{cancellation, CancelHandle, CancelSignal, RequestContext};
pub use dataset::{compute_from_source, EmissionRecord, EmissionsSource, InMemoryDataset};
pub use errors::{
    CorruptEntryError, DatasetError, ErrorKind, QueryError, StoreError, ValidationError,
};
pub use key::{derive_key, CacheKey, KeyDeriver};
pub use query::{parse_iso_date, DateRange, EmissionsQuery, QueryRequest};
pub use service::{EmissionsQueryService, QueryOutcome, Resolution, Stage};
