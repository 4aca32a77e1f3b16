// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the streamstats engine.
///
/// Store credentials have no defaults; startup fails with a clear message
/// when they are missing from both flags and environment.
#[derive(Debug, Clone, clap::Parser)]
pub struct StatsConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "STATS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8787, env = "STATS_PORT")]
    pub port: u16,

    /// Relational store host.
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,

    /// Relational store port.
    #[arg(long, default_value_t = 5432, env = "DB_PORT")]
    pub db_port: u16,

    /// Store user.
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Store password.
    #[arg(long, env = "DB_PASSWORD")]
    pub db_password: String,

    /// Store database name.
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Base connection pool size.
    #[arg(long, default_value_t = 5, env = "DB_POOL_SIZE")]
    pub db_pool_size: u32,

    /// Extra connections allowed beyond the base pool size.
    #[arg(long, default_value_t = 10, env = "DB_POOL_OVERFLOW")]
    pub db_pool_overflow: u32,

    /// Aggregation (minute flush) interval in seconds.
    #[arg(long, default_value_t = 60, env = "AGGREGATION_INTERVAL_SECONDS")]
    pub aggregation_interval_seconds: u64,

    /// Live-session snapshot interval in seconds.
    #[arg(long, default_value_t = 30, env = "SESSION_SYNC_INTERVAL_SECONDS")]
    pub session_sync_interval_seconds: u64,

    /// Max buffered deltas per minute; oldest are dropped on overflow.
    #[arg(long, default_value_t = 100_000, env = "STATS_DELTA_BUFFER")]
    pub delta_buffer_capacity: usize,

    /// Bounded wait for in-flight requests on shutdown, in seconds.
    #[arg(long, default_value_t = 10, env = "STATS_SHUTDOWN_GRACE_SECONDS")]
    pub shutdown_grace_seconds: u64,

    /// Discard snapshot rows older than this many hours during recovery.
    /// Unset means no horizon.
    #[arg(long, env = "STATS_STALE_SESSION_HOURS")]
    pub stale_session_hours: Option<u64>,
}

impl StatsConfig {
    pub fn aggregation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.aggregation_interval_seconds.max(1))
    }

    pub fn session_sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_sync_interval_seconds.max(1))
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_grace_seconds)
    }
}
