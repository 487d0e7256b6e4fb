// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use emissions_cache::bootstrap::run;
use emissions_cache::constants::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    match std::env::var(env::LOG_FORMAT).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }

    if let Err(e) = run().await {
        tracing::error!("Emissions query failed: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
