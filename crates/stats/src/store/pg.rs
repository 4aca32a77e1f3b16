// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PostgreSQL implementation of [`StatsStore`] over an sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use crate::config::StatsConfig;
use crate::session::Dimension;
use crate::store::{MinuteRow, SessionRow, StatsStore};

const METRIC_COLUMNS: &str = "sessions_started, sessions_closed, total_bytes, bandwidth_bps, \
     watch_time_seconds, unique_users, peak_concurrent";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stats_global (
        minute              TIMESTAMPTZ PRIMARY KEY,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS stats_by_server (
        minute              TIMESTAMPTZ NOT NULL,
        server              TEXT NOT NULL,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (minute, server)
    )",
    "CREATE TABLE IF NOT EXISTS stats_by_channel (
        minute              TIMESTAMPTZ NOT NULL,
        channel             TEXT NOT NULL,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (minute, channel)
    )",
    "CREATE TABLE IF NOT EXISTS stats_by_country (
        minute              TIMESTAMPTZ NOT NULL,
        country             TEXT NOT NULL,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (minute, country)
    )",
    "CREATE TABLE IF NOT EXISTS stats_by_protocol (
        minute              TIMESTAMPTZ NOT NULL,
        protocol            TEXT NOT NULL,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (minute, protocol)
    )",
    "CREATE TABLE IF NOT EXISTS stats_by_user_agent (
        minute              TIMESTAMPTZ NOT NULL,
        user_agent          TEXT NOT NULL,
        sessions_started    BIGINT NOT NULL DEFAULT 0,
        sessions_closed     BIGINT NOT NULL DEFAULT 0,
        total_bytes         BIGINT NOT NULL DEFAULT 0,
        bandwidth_bps       BIGINT NOT NULL DEFAULT 0,
        watch_time_seconds  BIGINT NOT NULL DEFAULT 0,
        unique_users        BIGINT NOT NULL DEFAULT 0,
        peak_concurrent     BIGINT NOT NULL DEFAULT 0,
        PRIMARY KEY (minute, user_agent)
    )",
    "CREATE TABLE IF NOT EXISTS active_sessions (
        id                  TEXT PRIMARY KEY,
        server              TEXT NOT NULL,
        channel             TEXT NOT NULL,
        country             TEXT NOT NULL,
        protocol            TEXT NOT NULL,
        user_agent          TEXT NOT NULL,
        user_agent_class    TEXT NOT NULL,
        user_id             TEXT NOT NULL,
        ip                  TEXT NOT NULL,
        opened_at           TIMESTAMPTZ NOT NULL,
        last_seen_at        TIMESTAMPTZ NOT NULL,
        bytes               BIGINT NOT NULL DEFAULT 0
    )",
];

/// Map a dimension to its table and key column. Global has no key column.
fn table_for(dimension: Dimension) -> (&'static str, Option<&'static str>) {
    match dimension {
        Dimension::Global => ("stats_global", None),
        Dimension::Server => ("stats_by_server", Some("server")),
        Dimension::Channel => ("stats_by_channel", Some("channel")),
        Dimension::Country => ("stats_by_country", Some("country")),
        Dimension::Protocol => ("stats_by_protocol", Some("protocol")),
        Dimension::UserAgentClass => ("stats_by_user_agent", Some("user_agent")),
    }
}

fn update_clause() -> String {
    [
        "sessions_started",
        "sessions_closed",
        "total_bytes",
        "bandwidth_bps",
        "watch_time_seconds",
        "unique_users",
        "peak_concurrent",
    ]
    .iter()
    .map(|c| format!("{c} = EXCLUDED.{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with a pool sized `pool_size + pool_overflow`.
    pub async fn connect(config: &StatsConfig) -> anyhow::Result<Self> {
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            config.db_user, config.db_password, config.db_host, config.db_port, config.db_name
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.db_pool_size + config.db_pool_overflow)
            .connect(&url)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl StatsStore for PgStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn upsert_minute(
        &self,
        dimension: Dimension,
        minute: DateTime<Utc>,
        rows: &[MinuteRow],
    ) -> anyhow::Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let (table, key_column) = table_for(dimension);

        let mut qb: QueryBuilder<Postgres> = match key_column {
            Some(col) => {
                QueryBuilder::new(format!("INSERT INTO {table} (minute, {col}, {METRIC_COLUMNS}) "))
            }
            None => QueryBuilder::new(format!("INSERT INTO {table} (minute, {METRIC_COLUMNS}) ")),
        };

        qb.push_values(rows, |mut b, row| {
            b.push_bind(minute);
            if key_column.is_some() {
                b.push_bind(&row.value);
            }
            b.push_bind(row.sessions_started as i64)
                .push_bind(row.sessions_closed as i64)
                .push_bind(row.total_bytes as i64)
                .push_bind(row.bandwidth_bps as i64)
                .push_bind(row.watch_time_seconds as i64)
                .push_bind(row.unique_users as i64)
                .push_bind(row.peak_concurrent as i64);
        });

        match key_column {
            Some(col) => qb.push(format!(" ON CONFLICT (minute, {col}) DO UPDATE SET ")),
            None => qb.push(" ON CONFLICT (minute) DO UPDATE SET "),
        };
        qb.push(update_clause());

        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn replace_active_sessions(&self, rows: &[SessionRow]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                "INSERT INTO active_sessions \
                 (id, server, channel, country, protocol, user_agent, user_agent_class, \
                  user_id, ip, opened_at, last_seen_at, bytes) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                 ON CONFLICT (id) DO UPDATE SET \
                 last_seen_at = EXCLUDED.last_seen_at, bytes = EXCLUDED.bytes",
            )
            .bind(&row.id)
            .bind(&row.server)
            .bind(&row.channel)
            .bind(&row.country)
            .bind(&row.protocol)
            .bind(&row.user_agent)
            .bind(&row.user_agent_class)
            .bind(&row.user_id)
            .bind(&row.ip)
            .bind(row.opened_at)
            .bind(row.last_seen_at)
            .bind(row.bytes)
            .execute(&mut *tx)
            .await?;
        }

        // Phase two: drop rows for sessions no longer live.
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        if ids.is_empty() {
            sqlx::query("DELETE FROM active_sessions").execute(&mut *tx).await?;
        } else {
            sqlx::query("DELETE FROM active_sessions WHERE NOT (id = ANY($1))")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_active_sessions(&self) -> anyhow::Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, server, channel, country, protocol, user_agent, user_agent_class, \
             user_id, ip, opened_at, last_seen_at, bytes FROM active_sessions",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
