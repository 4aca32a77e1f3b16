// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-bucket unique-user cardinality.
//!
//! Exact `HashSet` up to a threshold, then a HyperLogLog sketch so a hot
//! channel cannot grow a minute bucket without bound. 2^14 registers give
//! a standard error of about 0.8%.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Exact-set size at which a bucket falls back to the sketch.
pub const EXACT_THRESHOLD: usize = 10_000;

const HLL_BITS: u32 = 14;
const HLL_REGISTERS: usize = 1 << HLL_BITS;

#[derive(Debug, Clone)]
pub enum UniqueUsers {
    Exact(HashSet<String>),
    Sketch(Hll),
}

impl Default for UniqueUsers {
    fn default() -> Self {
        Self::Exact(HashSet::new())
    }
}

impl UniqueUsers {
    pub fn insert(&mut self, user_id: &str) {
        match self {
            Self::Exact(set) => {
                if set.contains(user_id) {
                    return;
                }
                if set.len() >= EXACT_THRESHOLD {
                    let mut hll = Hll::new();
                    for id in set.iter() {
                        hll.insert(id);
                    }
                    hll.insert(user_id);
                    *self = Self::Sketch(hll);
                } else {
                    set.insert(user_id.to_owned());
                }
            }
            Self::Sketch(hll) => hll.insert(user_id),
        }
    }

    /// Cardinality: exact below the threshold, estimated above it.
    pub fn count(&self) -> u64 {
        match self {
            Self::Exact(set) => set.len() as u64,
            Self::Sketch(hll) => hll.estimate(),
        }
    }
}

/// Dense HyperLogLog over `DefaultHasher` (fixed-key SipHash) values.
#[derive(Debug, Clone)]
pub struct Hll {
    registers: Vec<u8>,
}

impl Hll {
    pub fn new() -> Self {
        Self { registers: vec![0u8; HLL_REGISTERS] }
    }

    pub fn insert(&mut self, item: &str) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        item.hash(&mut hasher);
        let h = hasher.finish();
        let index = (h >> (64 - HLL_BITS)) as usize;
        let rest = h << HLL_BITS;
        // Rank of the first set bit in the remaining 50 bits, 1-based.
        let rank = (rest.leading_zeros().min(64 - HLL_BITS) + 1) as u8;
        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    pub fn estimate(&self) -> u64 {
        let m = HLL_REGISTERS as f64;
        let sum: f64 = self.registers.iter().map(|&r| 2f64.powi(-i32::from(r))).sum();
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        let raw = alpha * m * m / sum;

        // Linear-counting correction in the small range.
        if raw <= 2.5 * m {
            let zeros = self.registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                return (m * (m / zeros as f64).ln()).round() as u64;
            }
        }
        raw.round() as u64
    }
}

impl Default for Hll {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "uniques_tests.rs"]
mod uniques_tests;
