// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streamstats: per-minute viewing statistics for streaming origins.
//!
//! Origin servers POST session lifecycle events to `/api/webhook`; the
//! engine keeps an authoritative in-memory view of live sessions and
//! condenses it into per-minute dimension rows in a relational store.

pub mod aggregate;
pub mod bucket;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod transport;
pub mod uniques;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::StatsConfig;
use crate::session::Session;
use crate::state::StatsState;
use crate::store::pg::PgStore;
use crate::store::StatsStore;
use crate::transport::build_router;

/// Initialize structured logging from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run the engine until shutdown, against the configured PostgreSQL store.
pub async fn run(config: StatsConfig) -> anyhow::Result<()> {
    let store = PgStore::connect(&config).await.context("failed to connect to store")?;
    store.ensure_schema().await.context("failed to create schema")?;
    run_with_store(config, Arc::new(store)).await
}

/// Run against any store implementation. Split out so tests can drive the
/// full engine with an in-memory store.
pub async fn run_with_store(
    config: StatsConfig,
    store: Arc<dyn StatsStore>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let state = Arc::new(StatsState::new(config, store, shutdown.clone()));

    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("streamstats listening on {addr}");

    spawn_signal_listener(shutdown.clone());

    let router = build_router(Arc::clone(&state));
    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
        })
    };

    // Recovery must complete before intake is enabled; until then the
    // webhook and health endpoints answer 503.
    if let Err(e) = recover(&state).await {
        shutdown.cancel();
        return Err(e.context("recovery failed"));
    }
    state.set_ready();
    tracing::info!(live = state.manager.live_count(), "recovery complete, intake enabled");

    aggregate::spawn_aggregator(Arc::clone(&state));
    snapshot::spawn_snapshotter(Arc::clone(&state));

    shutdown.cancelled().await;
    tracing::info!("shutting down");

    // Bounded wait for in-flight requests, then flush the partial minute
    // and take a final snapshot. Correctness on restart depends on the
    // snapshot, not on mid-minute aggregation.
    let grace = state.config.shutdown_grace();
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => {
            if let Ok(Err(e)) = joined {
                tracing::warn!(err = %e, "server task ended with error");
            }
        }
        Err(_) => tracing::warn!("shutdown grace expired, dropping in-flight requests"),
    }

    aggregate::flush_minute(&state, manager::minute_floor(Utc::now())).await;
    if let Err(e) = snapshot::run_snapshot(&state).await {
        tracing::warn!(err = %e, "final snapshot failed");
    }
    state.store.close().await;
    Ok(())
}

/// Rehydrate the sessions manager from the persisted snapshot.
async fn recover(state: &StatsState) -> anyhow::Result<()> {
    let rows = state.store.load_active_sessions().await?;
    let total = rows.len();

    let mut sessions: Vec<Session> = rows.into_iter().map(Session::from).collect();
    if let Some(hours) = state.config.stale_session_hours {
        let horizon = Utc::now() - chrono::Duration::hours(hours as i64);
        sessions.retain(|s| s.opened_at >= horizon);
        let discarded = total - sessions.len();
        if discarded > 0 {
            tracing::info!(discarded, "discarded stale snapshot sessions past horizon");
        }
    }

    state.manager.restore(sessions)
}

/// Cancel `shutdown` on the first SIGTERM or interrupt.
fn spawn_signal_listener(shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                // Without a SIGTERM stream, ctrl-c is still enough for an
                // orderly stop.
                tracing::warn!(err = %e, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                shutdown.cancel();
                return;
            }
        };

        tokio::select! {
            _ = term.recv() => tracing::info!("termination signal, stopping"),
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupt, stopping"),
        }
        shutdown.cancel();
    });
}
