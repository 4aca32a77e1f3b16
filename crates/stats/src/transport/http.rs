// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for webhook intake, health, and live-session counts.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::error::ApiError;
use crate::events::WebhookEvent;
use crate::manager::IngestOutcome;
use crate::state::StatsState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    /// Events applied by the sessions manager.
    pub ingested: usize,
    /// Events the manager rejected (duplicate open, unknown close, bad time).
    pub rejected: usize,
}

/// `POST /api/webhook` — ingest a batch of lifecycle events.
///
/// Malformed JSON or a schema-invalid event rejects the whole batch with
/// 400 before any event reaches the manager. Manager-level rejections do
/// not affect the HTTP status.
pub async fn webhook(
    State(s): State<Arc<StatsState>>,
    body: Result<Json<Vec<WebhookEvent>>, JsonRejection>,
) -> impl IntoResponse {
    if !s.is_ready() {
        return ApiError::NotReady.to_http_response("recovery in progress").into_response();
    }

    let events = match body {
        Ok(Json(events)) => events,
        Err(rejection) => {
            return ApiError::BadRequest.to_http_response(rejection.body_text()).into_response();
        }
    };
    for event in &events {
        if let Err(msg) = event.validate() {
            return ApiError::BadRequest.to_http_response(msg).into_response();
        }
    }

    let mut ingested = 0usize;
    let mut rejected = 0usize;
    for event in &events {
        match s.manager.ingest(event, Utc::now()) {
            IngestOutcome::Accepted { .. } => ingested += 1,
            IngestOutcome::Rejected(_) => rejected += 1,
        }
    }

    Json(WebhookResponse { status: "ok".to_owned(), ingested, rejected }).into_response()
}

/// `GET /health` — 200 once recovery has completed, 503 before.
pub async fn health(State(s): State<Arc<StatsState>>) -> impl IntoResponse {
    if s.is_ready() {
        Json(HealthResponse { status: "ok".to_owned() }).into_response()
    } else {
        ApiError::NotReady.to_http_response("recovery in progress").into_response()
    }
}

/// `GET /stats/active` — current live counts along every dimension.
pub async fn stats_active(State(s): State<Arc<StatsState>>) -> impl IntoResponse {
    Json(s.manager.active_summary())
}
