// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line entry point
//!
//! ```text
//! emissions-cache <startDate> <endDate> [facility...]
//! ```
//!
//! The dataset, cache backend and tuning come from the environment (a `.env`
//! file is honoured); see [`crate::constants::env`]. The aggregated rows are
//! printed to stdout as JSON.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use dotenvy::dotenv;
use tracing::info;

use crate::cache::OverlapPolicy;
use crate::config::constants::{env, DEFAULT_CACHE_PATH};
use crate::config::{EmissionsCacheConfig, EmissionsCacheConfigBuilder};
use crate::context::RequestContext;
use crate::dataset::InMemoryDataset;
use crate::query::QueryRequest;
use crate::service::EmissionsQueryService;
use crate::store::{DiskStore, KeyValueStore, MemoryStore, NoOpStore};

/// Cache backend selected by `EMISSIONS_CACHE_BACKEND`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    #[default]
    Disk,
    None,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "disk" => Ok(CacheBackend::Disk),
            "none" | "noop" => Ok(CacheBackend::None),
            other => bail!("unknown cache backend `{other}` (expected memory, disk or none)"),
        }
    }
}

/// Main entry point for the application.
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = request_from_args(&args)?;
    let lookup = |name: &str| dotenvy::var(name).ok();

    let config = config_from_lookup(lookup)?;
    let dataset_path = lookup(env::DATASET)
        .with_context(|| format!("{} must be set to a JSON dataset file", env::DATASET))?;
    let dataset = InMemoryDataset::from_json_file(&dataset_path).await?;
    let store = store_from_lookup(lookup)?;

    let service = EmissionsQueryService::new(store, Arc::new(dataset), config);
    let outcome = service
        .query_with_context(&RequestContext::new(), &request)
        .await?;

    info!(key = %outcome.key, resolution = ?outcome.resolution, "Query complete");
    println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    Ok(())
}

/// Build a request from `<startDate> <endDate> [facility...]`
pub fn request_from_args(args: &[String]) -> anyhow::Result<QueryRequest> {
    let [start, end, facilities @ ..] = args else {
        bail!("usage: emissions-cache <startDate> <endDate> [facility...]");
    };
    Ok(QueryRequest::new(
        start.as_str(),
        end.as_str(),
        facilities.iter().map(String::as_str),
    ))
}

/// Read service configuration through `lookup`, starting from defaults
pub fn config_from_lookup<F>(lookup: F) -> anyhow::Result<EmissionsCacheConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = EmissionsCacheConfigBuilder::with_defaults();

    if let Some(namespace) = lookup(env::NAMESPACE) {
        builder = builder.namespace(namespace);
    }
    if let Some(policy) = lookup(env::OVERLAP_POLICY) {
        let policy = policy
            .parse::<OverlapPolicy>()
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("invalid {}", env::OVERLAP_POLICY))?;
        builder = builder.overlap_policy(policy);
    }
    if let Some(timeout) = millis(&lookup, env::STORE_TIMEOUT_MS)? {
        builder = builder.store_timeout(timeout);
    }
    if let Some(timeout) = millis(&lookup, env::DATASET_TIMEOUT_MS)? {
        builder = builder.dataset_timeout(timeout);
    }

    Ok(builder.build())
}

fn millis<F>(lookup: &F, name: &str) -> anyhow::Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("{name} must be a whole number of milliseconds"))
        })
        .transpose()
}

/// Open the cache backend selected through `lookup`
pub fn store_from_lookup<F>(lookup: F) -> anyhow::Result<Arc<dyn KeyValueStore>>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = match lookup(env::CACHE_BACKEND) {
        Some(raw) => raw.parse::<CacheBackend>()?,
        None => CacheBackend::default(),
    };

    let store: Arc<dyn KeyValueStore> = match backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::None => Arc::new(NoOpStore),
        CacheBackend::Disk => {
            let path = lookup(env::CACHE_PATH).unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string());
            Arc::new(
                DiskStore::new(&path)
                    .validate()
                    .with_context(|| format!("cannot use disk cache at {path}"))?,
            )
        }
    };
    Ok(store)
}
