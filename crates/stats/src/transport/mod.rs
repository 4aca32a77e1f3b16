// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP intake and introspection endpoints.

pub mod http;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::StatsState;

/// Build the axum `Router` with all engine routes.
pub fn build_router(state: Arc<StatsState>) -> Router {
    Router::new()
        .route("/api/webhook", post(http::webhook))
        .route("/health", get(http::health))
        .route("/stats/active", get(http::stats_active))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
