// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Webhook wire schema.
//!
//! Origin servers POST a JSON array of these objects. Unknown fields are
//! ignored; schema violations are rejected at the transport boundary and
//! never reach the sessions manager.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PlayStarted,
    PlayClosed,
}

/// One lifecycle event as delivered by an origin server.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event emission time, RFC 3339 UTC.
    pub time: DateTime<Utc>,
    pub event: EventKind,
    /// Globally unique session id.
    pub id: String,
    pub server: String,
    /// Channel (media) name.
    pub media: String,
    pub user_id: String,
    pub ip: String,
    /// ISO-2 country code, possibly empty.
    #[serde(default)]
    pub country: String,
    pub proto: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub user_agent: String,
    /// Milliseconds since epoch.
    pub opened_at: i64,
    /// Milliseconds since epoch; required on `play_closed`.
    #[serde(default)]
    pub closed_at: Option<i64>,
    /// Required on `play_closed`.
    #[serde(default)]
    pub reason: Option<String>,
}

impl WebhookEvent {
    /// Schema-level validation beyond what serde enforces: `play_closed`
    /// must carry `closed_at` and `reason`.
    pub fn validate(&self) -> Result<(), String> {
        if self.event == EventKind::PlayClosed {
            if self.closed_at.is_none() {
                return Err(format!("event {}: play_closed without closed_at", self.id));
            }
            if self.reason.is_none() {
                return Err(format!("event {}: play_closed without reason", self.id));
            }
        }
        Ok(())
    }
}

/// Interpret an epoch-milliseconds field as an instant. Non-positive or
/// out-of-range values are malformed.
pub fn instant_from_ms(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
}
