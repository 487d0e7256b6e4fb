// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Cached query results and overlap detection.
//!
//! This module provides:
//! - [`CacheEntry`], the stored form of a computed query result
//! - [`OverlapScanner`], which finds entries whose range and facility set
//!   intersect a new query

pub mod entry;
pub mod overlap;

pub use entry::CacheEntry;
pub use overlap::{entry_overlaps, OverlapMatch, OverlapPolicy, OverlapScanner};
