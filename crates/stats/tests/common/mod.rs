// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test support: an in-memory [`StatsStore`] and config/state
//! builders used by the HTTP and scenario tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use streamstats::config::StatsConfig;
use streamstats::session::Dimension;
use streamstats::state::StatsState;
use streamstats::store::{MinuteRow, SessionRow, StatsStore};

/// Key of one persisted dimension row: (dimension, minute, value).
pub type RowKey = (&'static str, DateTime<Utc>, String);

/// In-memory store with insert-or-replace semantics matching the
/// relational tables, plus failure injection for retry tests.
#[derive(Default)]
pub struct MemStore {
    pub minutes: Mutex<HashMap<RowKey, MinuteRow>>,
    pub active: Mutex<HashMap<String, SessionRow>>,
    /// Number of upcoming `upsert_minute` calls that fail.
    pub fail_upserts: AtomicU32,
}

impl MemStore {
    pub fn minute_row(
        &self,
        dimension: Dimension,
        minute: DateTime<Utc>,
        value: &str,
    ) -> Option<MinuteRow> {
        self.minutes.lock().get(&(dimension.as_str(), minute, value.to_owned())).cloned()
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl StatsStore for MemStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn upsert_minute(
        &self,
        dimension: Dimension,
        minute: DateTime<Utc>,
        rows: &[MinuteRow],
    ) -> anyhow::Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) > 0 {
            self.fail_upserts.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("injected store failure");
        }
        let mut minutes = self.minutes.lock();
        for row in rows {
            minutes.insert((dimension.as_str(), minute, row.value.clone()), row.clone());
        }
        Ok(())
    }

    async fn replace_active_sessions(&self, rows: &[SessionRow]) -> anyhow::Result<()> {
        let mut active = self.active.lock();
        for row in rows {
            active.insert(row.id.clone(), row.clone());
        }
        let keep: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        active.retain(|id, _| keep.contains(&id.as_str()));
        Ok(())
    }

    async fn load_active_sessions(&self) -> anyhow::Result<Vec<SessionRow>> {
        Ok(self.active.lock().values().cloned().collect())
    }
}

pub fn test_config() -> StatsConfig {
    StatsConfig {
        host: "127.0.0.1".into(),
        port: 0,
        db_host: "localhost".into(),
        db_port: 5432,
        db_user: "stats".into(),
        db_password: "stats".into(),
        db_name: "stats".into(),
        db_pool_size: 5,
        db_pool_overflow: 10,
        aggregation_interval_seconds: 60,
        session_sync_interval_seconds: 30,
        delta_buffer_capacity: 100_000,
        shutdown_grace_seconds: 10,
        stale_session_hours: None,
    }
}

pub fn test_state(store: Arc<MemStore>) -> Arc<StatsState> {
    Arc::new(StatsState::new(test_config(), store, CancellationToken::new()))
}
