// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relational store seam.
//!
//! The engine talks to the store through [`StatsStore`] so aggregation and
//! recovery are independent of the driver; [`pg::PgStore`] is the
//! production implementation.

pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::classify::UaClass;
use crate::session::{Dimension, Session};

/// One persisted row of a dimension table for one minute.
/// `value` is the dimension value; empty for the global table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteRow {
    pub value: String,
    pub sessions_started: u64,
    pub sessions_closed: u64,
    pub total_bytes: u64,
    pub bandwidth_bps: u64,
    pub watch_time_seconds: u64,
    pub unique_users: u64,
    pub peak_concurrent: u64,
}

/// One row of the `active_sessions` snapshot table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionRow {
    pub id: String,
    pub server: String,
    pub channel: String,
    pub country: String,
    pub protocol: String,
    pub user_agent: String,
    pub user_agent_class: String,
    pub user_id: String,
    pub ip: String,
    pub opened_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub bytes: i64,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            server: s.server.clone(),
            channel: s.channel.clone(),
            country: s.country.clone(),
            protocol: s.proto.clone(),
            user_agent: s.user_agent.clone(),
            user_agent_class: s.ua_class.as_str().to_owned(),
            user_id: s.user_id.clone(),
            ip: s.ip.clone(),
            opened_at: s.opened_at,
            last_seen_at: s.last_seen_at,
            bytes: s.bytes as i64,
        }
    }
}

impl From<SessionRow> for Session {
    fn from(r: SessionRow) -> Self {
        Self {
            id: r.id,
            server: r.server,
            channel: r.channel,
            country: r.country,
            proto: r.protocol,
            ua_class: UaClass::from_str_lossy(&r.user_agent_class),
            user_agent: r.user_agent,
            user_id: r.user_id,
            ip: r.ip,
            opened_at: r.opened_at,
            last_seen_at: r.last_seen_at,
            bytes: r.bytes.max(0) as u64,
        }
    }
}

/// Store operations the engine needs. Implementations must be safe to call
/// concurrently from the aggregator and the snapshotter.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Create all tables if they do not exist.
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Insert-or-replace the rows of one dimension table for one minute.
    /// Replaying the same rows must be idempotent.
    async fn upsert_minute(
        &self,
        dimension: Dimension,
        minute: DateTime<Utc>,
        rows: &[MinuteRow],
    ) -> anyhow::Result<()>;

    /// Two-phase snapshot write: upsert every row, then delete rows whose
    /// ids are not in `rows`. This process is the table's only writer.
    async fn replace_active_sessions(&self, rows: &[SessionRow]) -> anyhow::Result<()>;

    /// Read the full snapshot table for recovery.
    async fn load_active_sessions(&self) -> anyhow::Result<Vec<SessionRow>>;

    /// Release connections on shutdown.
    async fn close(&self) {}
}
