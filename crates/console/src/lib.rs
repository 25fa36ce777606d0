// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adconsole: advertiser credential custody and data synchronization for an
//! advertising platform's open API.

pub mod config;
pub mod credential;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;
use crate::scheduler::jobs::standard_jobs;
use crate::scheduler::JobBoard;
use crate::state::{build_lifecycle, AppState};
use crate::store::Store;
use crate::transport::build_router;

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing(config: &ConsoleConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the console until SIGINT/SIGTERM.
pub async fn run(config: ConsoleConfig) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let store = Store::connect(&config.database_url).await?;
    let lifecycle =
        Arc::new(build_lifecycle(&config, store.clone()).with_shutdown(shutdown.clone()));

    let scheduler = if config.no_scheduler {
        tracing::info!("scheduler disabled");
        None
    } else {
        Some(standard_jobs(&config, &lifecycle)?.spawn(shutdown.clone()).await)
    };
    let board = scheduler.as_ref().map(|h| h.board()).unwrap_or_else(JobBoard::new);

    let shutdown_timeout = config.shutdown_timeout();
    let state = Arc::new(AppState::new(config, store.clone(), lifecycle, board));
    spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("adconsole listening on {}", listener.local_addr()?);
    let served = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // Stop jobs even if the server failed.
    shutdown.cancel();
    if let Some(handle) = scheduler {
        if !handle.shutdown(shutdown_timeout).await {
            tracing::warn!("some jobs were aborted at shutdown");
        }
    }
    store.close().await;
    served?;

    tracing::info!("adconsole stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}
