// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minute-boundary aggregation: fold the rotated bucket and delta buffer
//! into dimension rows and upsert them.
//!
//! The timer re-aligns to the wall clock on every iteration so drift never
//! accumulates; a delayed process fires once per missed boundary, in order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::manager::{minute_floor, RotateOutput};
use crate::session::{BucketKey, DeltaKind, Dimension};
use crate::state::StatsState;
use crate::store::{MinuteRow, StatsStore};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_START: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy)]
struct DeltaSums {
    started: u64,
    closed: u64,
    bytes: u64,
    watch_seconds: u64,
}

/// Fold one completed minute into per-dimension rows.
///
/// Summable counters come from the deltas; peaks and unique-user counts
/// come from the bucket. The global row is computed independently of the
/// breakdowns, so missing dimension values (an empty country) still count.
pub fn build_rows(output: &RotateOutput, seconds_in_minute: u64) -> HashMap<Dimension, Vec<MinuteRow>> {
    let seconds = seconds_in_minute.max(1);

    let mut sums: HashMap<BucketKey, DeltaSums> = HashMap::new();
    for delta in &output.deltas {
        for (dimension, value) in delta.dimension_keys() {
            let entry = sums.entry(BucketKey::new(dimension, value)).or_default();
            match delta.kind {
                DeltaKind::Opened => entry.started += 1,
                DeltaKind::Closed => entry.closed += 1,
            }
            entry.bytes += delta.bytes;
            entry.watch_seconds += delta.watch_seconds;
        }
    }

    // Union of keys that saw events and keys that only carry live peaks.
    let mut keys: Vec<BucketKey> = sums.keys().cloned().collect();
    keys.extend(output.bucket.keys().cloned());
    keys.sort_by(|a, b| (a.dimension.as_str(), &a.value).cmp(&(b.dimension.as_str(), &b.value)));
    keys.dedup();

    let mut rows: HashMap<Dimension, Vec<MinuteRow>> = HashMap::new();
    for key in keys {
        let s = sums.get(&key).copied().unwrap_or_default();
        let row = MinuteRow {
            value: key.value.clone(),
            sessions_started: s.started,
            sessions_closed: s.closed,
            total_bytes: s.bytes,
            bandwidth_bps: s.bytes / seconds,
            watch_time_seconds: s.watch_seconds,
            unique_users: output.bucket.unique_users(&key),
            peak_concurrent: output.bucket.peak(&key),
        };
        if row.sessions_started == 0
            && row.sessions_closed == 0
            && row.total_bytes == 0
            && row.watch_time_seconds == 0
            && row.unique_users == 0
            && row.peak_concurrent == 0
        {
            continue;
        }
        rows.entry(key.dimension).or_default().push(row);
    }
    rows
}

/// Rotate the current minute out of the manager and persist it.
///
/// Store writes happen here, outside the manager's critical section. Each
/// dimension is retried with exponential backoff; a dimension that still
/// fails is logged and dropped. The source events are gone, so a
/// single-minute gap is preferable to halting ingest.
pub async fn flush_minute(state: &StatsState, minute: DateTime<Utc>) {
    let output = state.manager.rotate();

    if output.dropped_deltas > 0 {
        tracing::warn!(
            minute = %minute,
            dropped = output.dropped_deltas,
            "delta buffer overflowed; dropped oldest deltas"
        );
    }
    let c = output.counters;
    if c.duplicate_open + c.unknown_close + c.malformed_time + c.stale > 0 {
        tracing::info!(
            minute = %minute,
            duplicate_open = c.duplicate_open,
            unknown_close = c.unknown_close,
            malformed_time = c.malformed_time,
            stale = c.stale,
            "ingest rejections this minute"
        );
    }

    let rows = build_rows(&output, state.config.aggregation_interval_seconds);
    for dimension in Dimension::ALL {
        let Some(dimension_rows) = rows.get(&dimension) else { continue };
        upsert_with_retry(state, dimension, minute, dimension_rows).await;
    }
}

async fn upsert_with_retry(
    state: &StatsState,
    dimension: Dimension,
    minute: DateTime<Utc>,
    rows: &[MinuteRow],
) {
    let mut backoff = RETRY_START;
    for attempt in 1..=RETRY_ATTEMPTS {
        match state.store.upsert_minute(dimension, minute, rows).await {
            Ok(()) => return,
            Err(e) if attempt < RETRY_ATTEMPTS => {
                tracing::warn!(
                    dimension = dimension.as_str(),
                    minute = %minute,
                    attempt,
                    err = %e,
                    "dimension upsert failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => {
                tracing::error!(
                    dimension = dimension.as_str(),
                    minute = %minute,
                    rows = rows.len(),
                    err = %e,
                    "dimension upsert failed permanently, dropping minute"
                );
            }
        }
    }
}

/// Spawn the aggregation timer, aligned to wall-clock boundaries.
pub fn spawn_aggregator(state: Arc<StatsState>) {
    tokio::spawn(async move {
        let interval = state.config.aggregation_interval_seconds.max(1) as i64;
        let mut last = boundary_floor(Utc::now(), interval);

        loop {
            // Re-align from the wall clock each pass to avoid drift.
            let next = last + Duration::seconds(interval);
            let sleep_for =
                (next - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }

            let current = boundary_floor(Utc::now(), interval);
            while last < current {
                let minute = last;
                last = last + Duration::seconds(interval);
                flush_minute(&state, minute).await;
            }
        }
    });
}

/// Floor an instant to the start of its aggregation window.
/// Equal to [`minute_floor`] for the default 60 s interval.
pub fn boundary_floor(t: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
    if interval_secs == 60 {
        return minute_floor(t);
    }
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(interval_secs.max(1));
    DateTime::<Utc>::from_timestamp(floored, 0).unwrap_or(t)
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod aggregate_tests;
