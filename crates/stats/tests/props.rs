// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests over the sessions manager and classifier.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use streamstats::aggregate::build_rows;
use streamstats::classify::classify;
use streamstats::events::{EventKind, WebhookEvent};
use streamstats::manager::{IngestOutcome, SessionsManager};
use streamstats::session::Dimension;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

fn event(open: bool, id: u8) -> WebhookEvent {
    let t = base_time();
    WebhookEvent {
        time: t,
        event: if open { EventKind::PlayStarted } else { EventKind::PlayClosed },
        id: format!("session-{id}"),
        server: format!("s{}", id % 3),
        media: format!("c{}", id % 4),
        user_id: format!("u{}", id % 5),
        ip: "10.0.0.1".to_owned(),
        country: if id % 2 == 0 { "AU".to_owned() } else { String::new() },
        proto: "hls".to_owned(),
        bytes: if open { 0 } else { u64::from(id) * 1000 + 5000 },
        user_agent: "Lavf53.32.100".to_owned(),
        opened_at: t.timestamp_millis(),
        closed_at: if open { None } else { Some(t.timestamp_millis() + 30_000) },
        reason: if open { None } else { Some("stop".to_owned()) },
    }
}

/// (started, closed, bytes, watch) of the global row, zero when absent.
fn global_sums(
    rows: &std::collections::HashMap<Dimension, Vec<streamstats::store::MinuteRow>>,
) -> (u64, u64, u64, u64) {
    rows.get(&Dimension::Global)
        .and_then(|r| r.iter().find(|row| row.value.is_empty()))
        .map(|r| (r.sessions_started, r.sessions_closed, r.total_bytes, r.watch_time_seconds))
        .unwrap_or((0, 0, 0, 0))
}

proptest! {
    /// Live-session count always equals accepted opens minus accepted closes.
    #[test]
    fn live_count_is_accepted_opens_minus_closes(
        events in prop::collection::vec((any::<bool>(), 0u8..8), 0..120)
    ) {
        let manager = SessionsManager::new(100_000);
        let now = base_time();
        let mut opens = 0i64;
        let mut closes = 0i64;

        for (open, id) in events {
            match manager.ingest(&event(open, id), now) {
                IngestOutcome::Accepted { .. } if open => opens += 1,
                IngestOutcome::Accepted { .. } => closes += 1,
                IngestOutcome::Rejected(_) => {}
            }
        }

        prop_assert_eq!(manager.live_count() as i64, opens - closes);
    }

    /// Peak concurrency is bounded below by the final live count and above
    /// by everything that was ever open in the minute.
    #[test]
    fn peak_is_bounded(
        events in prop::collection::vec((any::<bool>(), 0u8..8), 1..120)
    ) {
        let manager = SessionsManager::new(100_000);
        let now = base_time();
        let mut opens = 0u64;

        for (open, id) in events {
            if matches!(
                manager.ingest(&event(open, id), now),
                IngestOutcome::Accepted { .. }
            ) && open {
                opens += 1;
            }
        }

        let live = manager.live_count() as u64;
        let output = manager.rotate();
        let rows = build_rows(&output, 60);
        let peak = rows
            .get(&Dimension::Global)
            .and_then(|r| r.iter().find(|row| row.value.is_empty()))
            .map(|r| r.peak_concurrent)
            .unwrap_or(0);

        prop_assert!(peak <= opens, "peak {} > opens {}", peak, opens);
        prop_assert!(peak >= live, "peak {} < live {}", peak, live);
    }

    /// Rotating mid-stream moves counters between minutes but never changes
    /// their sum.
    #[test]
    fn rotation_point_does_not_change_counter_sums(
        events in prop::collection::vec((any::<bool>(), 0u8..8), 0..80),
        split in 0usize..80
    ) {
        let now = base_time();

        let single = SessionsManager::new(100_000);
        for (open, id) in &events {
            single.ingest(&event(*open, *id), now);
        }
        let expected = global_sums(&build_rows(&single.rotate(), 60));

        let rotated = SessionsManager::new(100_000);
        let split = split.min(events.len());
        for (open, id) in &events[..split] {
            rotated.ingest(&event(*open, *id), now);
        }
        let first = global_sums(&build_rows(&rotated.rotate(), 60));
        for (open, id) in &events[split..] {
            rotated.ingest(&event(*open, *id), now);
        }
        let second = global_sums(&build_rows(&rotated.rotate(), 60));

        let combined = (
            first.0 + second.0,
            first.1 + second.1,
            first.2 + second.2,
            first.3 + second.3,
        );
        prop_assert_eq!(combined, expected);
    }

    /// The classifier is total and deterministic for arbitrary input.
    #[test]
    fn classifier_is_total_and_deterministic(ua in ".*") {
        let first = classify(&ua);
        prop_assert_eq!(classify(&ua), first);
    }
}
