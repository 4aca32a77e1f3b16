// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active sessions manager: the single owner of the live-session table,
//! the current minute bucket, and the delta buffer.
//!
//! All three live under one mutex so every ingest is atomic with respect
//! to rotation and snapshotting. Critical sections are O(dimensions);
//! everything expensive (row building, store writes) happens outside, on
//! data handed off by [`SessionsManager::rotate`].

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::bucket::MinuteBucket;
use crate::classify::classify;
use crate::events::{instant_from_ms, EventKind, WebhookEvent};
use crate::session::{BucketKey, Delta, DeltaKind, Dimension, Session};

// -- Outcomes -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// `play_started` for a session id that is already live.
    DuplicateOpen,
    /// `play_closed` for a session id that is not live.
    UnknownClose,
    /// An instant field that cannot be interpreted.
    MalformedTime,
}

impl RejectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateOpen => "duplicate_open",
            Self::UnknownClose => "unknown_close",
            Self::MalformedTime => "malformed_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Applied to the current minute. `stale` marks events that arrived
    /// more than a full minute after their own timestamp; they are counted
    /// in the arrival minute regardless.
    Accepted { stale: bool },
    Rejected(RejectKind),
}

/// Running totals of rejected / flagged events, reported at rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestCounters {
    pub duplicate_open: u64,
    pub unknown_close: u64,
    pub malformed_time: u64,
    pub stale: u64,
}

/// Everything the aggregator needs for one completed minute, handed off
/// atomically by [`SessionsManager::rotate`].
#[derive(Debug)]
pub struct RotateOutput {
    pub bucket: MinuteBucket,
    pub deltas: Vec<Delta>,
    pub dropped_deltas: u64,
    pub counters: IngestCounters,
}

/// Live counts per dimension for `/stats/active`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ActiveSummary {
    pub total: u64,
    pub by_server: HashMap<String, u64>,
    pub by_channel: HashMap<String, u64>,
    pub by_country: HashMap<String, u64>,
    pub by_protocol: HashMap<String, u64>,
    pub by_user_agent_class: HashMap<String, u64>,
}

// -- Manager ------------------------------------------------------------------

struct Inner {
    live: HashMap<String, Session>,
    live_counts: HashMap<BucketKey, u64>,
    bucket: MinuteBucket,
    deltas: VecDeque<Delta>,
    dropped_deltas: u64,
    counters: IngestCounters,
    restored: bool,
}

pub struct SessionsManager {
    inner: Mutex<Inner>,
    delta_capacity: usize,
}

impl SessionsManager {
    pub fn new(delta_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                live: HashMap::new(),
                live_counts: HashMap::new(),
                bucket: MinuteBucket::default(),
                deltas: VecDeque::new(),
                dropped_deltas: 0,
                counters: IngestCounters::default(),
                restored: false,
            }),
            delta_capacity,
        }
    }

    /// Ingest one validated event, attributed to the minute of `now`.
    pub fn ingest(&self, event: &WebhookEvent, now: DateTime<Utc>) -> IngestOutcome {
        let stale = event.time < minute_floor(now) - Duration::seconds(60);

        let outcome = match event.event {
            EventKind::PlayStarted => self.ingest_open(event, stale),
            EventKind::PlayClosed => self.ingest_close(event, stale),
        };

        match outcome {
            IngestOutcome::Rejected(kind) => {
                tracing::debug!(session_id = %event.id, kind = kind.as_str(), "event rejected");
            }
            IngestOutcome::Accepted { stale: true } => {
                tracing::debug!(session_id = %event.id, time = %event.time, "stale event counted at arrival minute");
            }
            IngestOutcome::Accepted { stale: false } => {}
        }
        outcome
    }

    fn ingest_open(&self, event: &WebhookEvent, stale: bool) -> IngestOutcome {
        let Some(opened_at) = instant_from_ms(event.opened_at) else {
            self.inner.lock().counters.malformed_time += 1;
            return IngestOutcome::Rejected(RejectKind::MalformedTime);
        };

        // Classification is pure; do it before taking the lock.
        let session = Session {
            id: event.id.clone(),
            server: event.server.clone(),
            channel: event.media.clone(),
            country: event.country.clone(),
            proto: event.proto.clone(),
            user_agent: event.user_agent.clone(),
            ua_class: classify(&event.user_agent),
            user_id: event.user_id.clone(),
            ip: event.ip.clone(),
            opened_at,
            last_seen_at: opened_at,
            bytes: event.bytes,
        };
        let delta = Delta::from_session(DeltaKind::Opened, &session, event.time);

        let mut inner = self.inner.lock();
        if stale {
            inner.counters.stale += 1;
        }
        if inner.live.contains_key(&event.id) {
            inner.counters.duplicate_open += 1;
            return IngestOutcome::Rejected(RejectKind::DuplicateOpen);
        }

        for (dimension, value) in session.dimension_keys() {
            let key = BucketKey::new(dimension, value);
            let count = inner.live_counts.entry(key.clone()).or_insert(0);
            *count += 1;
            let count = *count;
            inner.bucket.raise_peak(&key, count);
            inner.bucket.add_user(&key, &session.user_id);
        }
        inner.live.insert(session.id.clone(), session);
        push_delta(&mut inner, delta, self.delta_capacity);

        IngestOutcome::Accepted { stale }
    }

    fn ingest_close(&self, event: &WebhookEvent, stale: bool) -> IngestOutcome {
        let Some(closed_at) = event.closed_at.and_then(instant_from_ms) else {
            self.inner.lock().counters.malformed_time += 1;
            return IngestOutcome::Rejected(RejectKind::MalformedTime);
        };

        let mut inner = self.inner.lock();
        if stale {
            inner.counters.stale += 1;
        }
        let Some(session) = inner.live.remove(&event.id) else {
            inner.counters.unknown_close += 1;
            return IngestOutcome::Rejected(RejectKind::UnknownClose);
        };

        let watch_seconds =
            (closed_at - session.opened_at).num_seconds().max(0) as u64;
        let byte_delta = event.bytes.saturating_sub(session.bytes);

        for (dimension, value) in session.dimension_keys() {
            let key = BucketKey::new(dimension, value);
            if let Some(count) = inner.live_counts.get_mut(&key) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    inner.live_counts.remove(&key);
                }
            }
            // Peak is a per-minute maximum; closes never lower it.
        }

        let mut delta = Delta::from_session(DeltaKind::Closed, &session, event.time);
        delta.bytes = byte_delta;
        delta.watch_seconds = watch_seconds;
        push_delta(&mut inner, delta, self.delta_capacity);

        IngestOutcome::Accepted { stale }
    }

    /// Swap in a fresh bucket seeded with current live counts and hand the
    /// completed minute to the caller. This is the single synchronization
    /// point between ingest and aggregation.
    pub fn rotate(&self) -> RotateOutput {
        let mut inner = self.inner.lock();
        let next = MinuteBucket::seeded(&inner.live_counts);
        let bucket = std::mem::replace(&mut inner.bucket, next);
        let deltas: Vec<Delta> = inner.deltas.drain(..).collect();
        let dropped_deltas = std::mem::take(&mut inner.dropped_deltas);
        let counters = std::mem::take(&mut inner.counters);
        RotateOutput { bucket, deltas, dropped_deltas, counters }
    }

    /// Copy of every live session, for the snapshot writer.
    pub fn snapshot_live(&self) -> Vec<Session> {
        self.inner.lock().live.values().cloned().collect()
    }

    /// Rehydrate the live table from a persisted snapshot. Must run exactly
    /// once, before intake is enabled; restored sessions seed peak counts
    /// for the next minute but emit no `opened` delta.
    pub fn restore(&self, sessions: Vec<Session>) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if inner.restored {
            anyhow::bail!("sessions manager already restored");
        }
        inner.restored = true;

        for session in sessions {
            if inner.live.contains_key(&session.id) {
                tracing::warn!(session_id = %session.id, "duplicate id in snapshot, skipping");
                continue;
            }
            for (dimension, value) in session.dimension_keys() {
                *inner.live_counts.entry(BucketKey::new(dimension, value)).or_insert(0) += 1;
            }
            inner.live.insert(session.id.clone(), session);
        }
        inner.bucket = MinuteBucket::seeded(&inner.live_counts);
        Ok(())
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Current live counts grouped for `/stats/active`.
    pub fn active_summary(&self) -> ActiveSummary {
        let inner = self.inner.lock();
        let mut summary = ActiveSummary { total: inner.live.len() as u64, ..Default::default() };
        for (key, &count) in &inner.live_counts {
            let map = match key.dimension {
                Dimension::Global => continue,
                Dimension::Server => &mut summary.by_server,
                Dimension::Channel => &mut summary.by_channel,
                Dimension::Country => &mut summary.by_country,
                Dimension::Protocol => &mut summary.by_protocol,
                Dimension::UserAgentClass => &mut summary.by_user_agent_class,
            };
            map.insert(key.value.clone(), count);
        }
        summary
    }
}

fn push_delta(inner: &mut Inner, delta: Delta, capacity: usize) {
    if inner.deltas.len() >= capacity {
        inner.deltas.pop_front();
        inner.dropped_deltas += 1;
    }
    inner.deltas.push_back(delta);
}

/// Floor an instant to the zero second of its wall-clock minute.
pub fn minute_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(60);
    DateTime::<Utc>::from_timestamp(floored, 0).unwrap_or(t)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;
