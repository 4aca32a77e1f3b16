// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core session and delta types shared by the manager and the aggregator.

use chrono::{DateTime, Utc};

use crate::classify::UaClass;

/// One viewer-channel engagement, keyed by its opaque session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub server: String,
    pub channel: String,
    /// ISO-2 country code, possibly empty.
    pub country: String,
    pub proto: String,
    pub user_agent: String,
    pub ua_class: UaClass,
    pub user_id: String,
    pub ip: String,
    pub opened_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Cumulative byte counter as last reported by the origin.
    pub bytes: u64,
}

impl Session {
    /// The six (dimension, value) pairs this session contributes to.
    pub fn dimension_keys(&self) -> [(Dimension, &str); 6] {
        [
            (Dimension::Global, ""),
            (Dimension::Server, &self.server),
            (Dimension::Channel, &self.channel),
            (Dimension::Country, &self.country),
            (Dimension::Protocol, &self.proto),
            (Dimension::UserAgentClass, self.ua_class.as_str()),
        ]
    }
}

/// Aggregation dimension. `Global` spans all sessions and uses an empty key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Global,
    Server,
    Channel,
    Country,
    Protocol,
    UserAgentClass,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Global,
        Dimension::Server,
        Dimension::Channel,
        Dimension::Country,
        Dimension::Protocol,
        Dimension::UserAgentClass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Server => "server",
            Self::Channel => "channel",
            Self::Country => "country",
            Self::Protocol => "protocol",
            Self::UserAgentClass => "user_agent_class",
        }
    }
}

/// A bucket key: one dimension value within one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub dimension: Dimension,
    pub value: String,
}

impl BucketKey {
    pub fn new(dimension: Dimension, value: impl Into<String>) -> Self {
        Self { dimension, value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Opened,
    Closed,
}

/// Append-only derivative of one accepted event, drained by the aggregator
/// at minute rotation.
#[derive(Debug, Clone)]
pub struct Delta {
    pub kind: DeltaKind,
    pub server: String,
    pub channel: String,
    pub country: String,
    pub proto: String,
    pub ua_class: UaClass,
    pub user_id: String,
    /// Bytes attributable to the minute; zero for `Opened`.
    pub bytes: u64,
    /// Watch time in seconds; zero for `Opened`.
    pub watch_seconds: u64,
    pub at: DateTime<Utc>,
}

impl Delta {
    pub fn from_session(kind: DeltaKind, session: &Session, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            server: session.server.clone(),
            channel: session.channel.clone(),
            country: session.country.clone(),
            proto: session.proto.clone(),
            ua_class: session.ua_class,
            user_id: session.user_id.clone(),
            bytes: 0,
            watch_seconds: 0,
            at,
        }
    }

    /// The six (dimension, value) pairs this delta contributes to.
    pub fn dimension_keys(&self) -> [(Dimension, &str); 6] {
        [
            (Dimension::Global, ""),
            (Dimension::Server, &self.server),
            (Dimension::Channel, &self.channel),
            (Dimension::Country, &self.country),
            (Dimension::Protocol, &self.proto),
            (Dimension::UserAgentClass, self.ua_class.as_str()),
        ]
    }
}
