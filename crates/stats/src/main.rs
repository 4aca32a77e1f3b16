// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::ExitCode;

use clap::Parser;

use streamstats::config::StatsConfig;

#[tokio::main]
async fn main() -> ExitCode {
    streamstats::init_tracing();

    match streamstats::run(StatsConfig::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("exiting: {e:#}");
            ExitCode::FAILURE
        }
    }
}
