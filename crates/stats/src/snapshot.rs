// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic mirror of the live-session table to the store, for crash
//! recovery. A failed write is retried on the next tick.

use std::sync::Arc;

use crate::state::StatsState;
use crate::store::{SessionRow, StatsStore};

/// Write the current live-session view to the `active_sessions` table.
pub async fn run_snapshot(state: &StatsState) -> anyhow::Result<()> {
    let rows: Vec<SessionRow> =
        state.manager.snapshot_live().iter().map(SessionRow::from).collect();
    let count = rows.len();
    state.store.replace_active_sessions(&rows).await?;
    tracing::debug!(sessions = count, "live-session snapshot written");
    Ok(())
}

/// Spawn the snapshot timer on its own cadence.
pub fn spawn_snapshotter(state: Arc<StatsState>) {
    let interval = state.config.session_sync_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so a fresh process
        // does not race recovery.
        timer.tick().await;

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(e) = run_snapshot(&state).await {
                tracing::warn!(err = %e, "session snapshot failed, will retry next tick");
            }
        }
    });
}
