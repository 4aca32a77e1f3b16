// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::StatsConfig;
use crate::manager::SessionsManager;
use crate::store::StatsStore;

/// Shared engine state.
pub struct StatsState {
    pub config: StatsConfig,
    pub manager: SessionsManager,
    pub store: Arc<dyn StatsStore>,
    pub shutdown: CancellationToken,
    /// False until recovery completes; intake returns 503 while false.
    ready: AtomicBool,
}

impl StatsState {
    pub fn new(config: StatsConfig, store: Arc<dyn StatsStore>, shutdown: CancellationToken) -> Self {
        let manager = SessionsManager::new(config.delta_buffer_capacity);
        Self { config, manager, store, shutdown, ready: AtomicBool::new(false) }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}
