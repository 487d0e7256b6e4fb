// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Deterministic cache keys for emissions queries
//!
//! A key is `<namespace>:<sha256 hex>` where the digest covers the canonical
//! JSON form of the query:
//!
//! ```text
//! {"businessFacility": ["A", "B"], "endDate": "2023-03-01", "startDate": "2023-01-01"}
//! ```
//!
//! Fields appear in sorted order, facilities are sorted, separators are
//! `", "` and `": "`, and every character from U+007F up is written as a
//! `\uXXXX` escape. This matches Python's `json.dumps(params, sort_keys=True)`
//! byte for byte, so keys stay interoperable with entries written by existing
//! producers sharing the store.
//!
//! Facilities form a set, so repeated names collapse before hashing. A producer
//! that hashed a raw `sorted(list)` containing duplicates (`["A", "A"]`)
//! derives a different key than the de-duplicated `["A"]` used here.

use std::fmt;
use std::io;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::constants::DEFAULT_NAMESPACE;
use crate::errors::StoreError;
use crate::query::EmissionsQuery;

/// Namespaced cache key, `<namespace>:<hex digest>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a raw key string, e.g. one returned by a store scan
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest after the namespace separator, if present
    pub fn digest(&self) -> Option<&str> {
        self.0.rsplit_once(':').map(|(_, digest)| digest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical field set hashed into the key. Declaration order is the
/// serialized order and must stay alphabetical.
#[derive(Serialize)]
struct CanonicalQuery<'a> {
    #[serde(rename = "businessFacility")]
    business_facility: Vec<&'a str>,
    #[serde(rename = "endDate")]
    end_date: String,
    #[serde(rename = "startDate")]
    start_date: String,
}

impl<'a> From<&'a EmissionsQuery> for CanonicalQuery<'a> {
    fn from(query: &'a EmissionsQuery) -> Self {
        let range = query.range();
        Self {
            // BTreeSet iteration is already sorted and de-duplicated
            business_facility: query.facilities().iter().map(String::as_str).collect(),
            end_date: range.end().format("%Y-%m-%d").to_string(),
            start_date: range.start().format("%Y-%m-%d").to_string(),
        }
    }
}

/// JSON formatter matching Python's default `json.dumps` output.
struct PythonCompatFormatter;

impl serde_json::ser::Formatter for PythonCompatFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.bytes().all(|b| b < 0x7f) {
            return writer.write_all(fragment.as_bytes());
        }
        // DEL is ASCII but escaped by `ensure_ascii`
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch < '\u{7f}' {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Derives cache keys under a fixed namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    namespace: String,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyDeriver {
    /// Create a deriver for `namespace` (without the trailing `:`)
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace this deriver writes keys under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix shared by every key in the namespace, used for scans
    pub fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Derive the exact-match key for a query
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the canonical form cannot be
    /// encoded. No key is produced in that case.
    pub fn derive(&self, query: &EmissionsQuery) -> Result<CacheKey, StoreError> {
        let canonical = canonical_json(query).map_err(StoreError::serialization)?;
        let digest = hex::encode(Sha256::digest(&canonical));
        Ok(CacheKey(format!("{}:{}", self.namespace, digest)))
    }
}

/// Derive a key under the default `emissions` namespace
pub fn derive_key(query: &EmissionsQuery) -> Result<CacheKey, StoreError> {
    KeyDeriver::default().derive(query)
}

/// Canonical JSON bytes hashed into a query's key.
pub(crate) fn canonical_json(query: &EmissionsQuery) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, PythonCompatFormatter);
    CanonicalQuery::from(query).serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryRequest;

    fn query(start: &str, end: &str, facilities: &[&str]) -> EmissionsQuery {
        QueryRequest::new(start, end, facilities.iter().copied())
            .validate()
            .unwrap()
    }

    #[test]
    fn test_canonical_json_matches_python_dumps() {
        let q = query("2023-01-01", "2023-03-01", &["A"]);
        let json = String::from_utf8(canonical_json(&q).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"businessFacility": ["A"], "endDate": "2023-03-01", "startDate": "2023-01-01"}"#
        );
    }

    #[test]
    fn test_canonical_json_escapes_non_ascii() {
        let q = query("2023-01-01", "2023-01-31", &["Café Zürich"]);
        let json = String::from_utf8(canonical_json(&q).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"businessFacility": ["Caf\u00e9 Z\u00fcrich"], "endDate": "2023-01-31", "startDate": "2023-01-01"}"#
        );
    }

    #[test]
    fn test_canonical_json_escapes_astral_as_surrogates() {
        let q = query("2023-01-01", "2023-01-31", &["🌱"]);
        let json = String::from_utf8(canonical_json(&q).unwrap()).unwrap();
        assert!(json.contains(r#"["\ud83c\udf31"]"#), "got {json}");
    }

    #[test]
    fn test_canonical_json_escapes_delete() {
        let q = query("2023-01-01", "2023-01-31", &["A\u{7f}B"]);
        let json = String::from_utf8(canonical_json(&q).unwrap()).unwrap();
        assert!(json.contains(r#"["A\u007fB"]"#), "got {json}");

        let plain = query("2023-01-01", "2023-01-31", &["A~B"]);
        let json = String::from_utf8(canonical_json(&plain).unwrap()).unwrap();
        assert!(json.contains(r#"["A~B"]"#), "got {json}");
    }

    #[test]
    fn test_duplicate_facilities_collapse_before_hashing() {
        let q = query("2023-01-01", "2023-01-31", &["A", "A"]);
        let json = String::from_utf8(canonical_json(&q).unwrap()).unwrap();
        assert!(json.starts_with(r#"{"businessFacility": ["A"], "#), "got {json}");
    }

    #[test]
    fn test_known_digests() {
        let key = derive_key(&query("2023-01-01", "2023-03-01", &["A"])).unwrap();
        assert_eq!(
            key.as_str(),
            "emissions:288f297a51eb63ae2892f7df62d3f2dbf35afedf04e512e8f27b0acb80db88c0"
        );

        let key = derive_key(&query(
            "2023-01-01",
            "2023-06-30",
            &["GreenEat Orchard", "GreenEat Changi"],
        )).unwrap();
        assert_eq!(
            key.digest(),
            Some("c90587a694681aa3d1d1d78f7b072c8f41a258060aa54880200d818b58e7fd73")
        );

        let key = derive_key(&query("2023-01-01", "2023-01-31", &["Café Zürich"])).unwrap();
        assert_eq!(
            key.digest(),
            Some("5c6f798855fc78f6f2b64bd470fc327f8a6664c1800c4920ff871a704b6cc9f1")
        );
    }

    #[test]
    fn test_key_ignores_facility_order_and_date_format() {
        let a = derive_key(&query("2023-01-01", "2023-03-01", &["B", "A"])).unwrap();
        let b = derive_key(&query("2023-01-01T00:00:00", "2023-03-01", &["A", "B"])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_queries_get_distinct_keys() {
        let a = derive_key(&query("2023-01-01", "2023-03-01", &["A"])).unwrap();
        let b = derive_key(&query("2023-01-01", "2023-03-02", &["A"])).unwrap();
        let c = derive_key(&query("2023-01-01", "2023-03-01", &["A", "B"])).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_custom_namespace() {
        let deriver = KeyDeriver::new("scope3");
        let key = deriver.derive(&query("2023-01-01", "2023-03-01", &["A"])).unwrap();
        assert!(key.as_str().starts_with(&deriver.prefix()));
        assert_eq!(deriver.prefix(), "scope3:");
        assert_eq!(key.digest().map(str::len), Some(64));
    }
}
