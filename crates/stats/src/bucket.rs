// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-minute accumulator state that must be tracked live rather than
//! derived from deltas: peak concurrency and unique-user sets.
//!
//! The summable counters (starts, closes, bytes, watch time) are folded
//! from the drained delta buffer at flush time, so an overflowing buffer
//! loses only counters while peaks and uniques stay correct.

use std::collections::HashMap;

use crate::session::BucketKey;
use crate::uniques::UniqueUsers;

#[derive(Debug, Default)]
pub struct MinuteBucket {
    peaks: HashMap<BucketKey, u64>,
    users: HashMap<BucketKey, UniqueUsers>,
}

impl MinuteBucket {
    /// A fresh bucket for the next minute, seeded with the current live
    /// counts so a minute without events still reports a flat peak line.
    pub fn seeded(live_counts: &HashMap<BucketKey, u64>) -> Self {
        let peaks =
            live_counts.iter().filter(|(_, &n)| n > 0).map(|(k, &n)| (k.clone(), n)).collect();
        Self { peaks, users: HashMap::new() }
    }

    /// Raise the peak for `key` to at least `live`. Never lowers.
    pub fn raise_peak(&mut self, key: &BucketKey, live: u64) {
        let peak = self.peaks.entry(key.clone()).or_insert(0);
        if live > *peak {
            *peak = live;
        }
    }

    pub fn add_user(&mut self, key: &BucketKey, user_id: &str) {
        self.users.entry(key.clone()).or_default().insert(user_id);
    }

    pub fn peak(&self, key: &BucketKey) -> u64 {
        self.peaks.get(key).copied().unwrap_or(0)
    }

    pub fn unique_users(&self, key: &BucketKey) -> u64 {
        self.users.get(key).map(UniqueUsers::count).unwrap_or(0)
    }

    /// Every key that carries a peak or a unique-user set this minute.
    pub fn keys(&self) -> impl Iterator<Item = &BucketKey> {
        let mut keys: Vec<&BucketKey> = self.peaks.keys().chain(self.users.keys()).collect();
        keys.sort_by(|a, b| (a.dimension.as_str(), &a.value).cmp(&(b.dimension.as_str(), &b.value)));
        keys.dedup();
        keys.into_iter()
    }
}
