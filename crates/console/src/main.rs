// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use adconsole::config::ConsoleConfig;

#[tokio::main]
async fn main() {
    let config = ConsoleConfig::parse();
    adconsole::init_tracing(&config);

    if let Err(e) = adconsole::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
