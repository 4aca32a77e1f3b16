// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-agent classification for the player-class aggregation dimension.

use serde::{Deserialize, Serialize};

/// Player class derived from the raw user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UaClass {
    Android,
    Ios,
    Tv,
    Stb,
    StreamingServer,
    Desktop,
    Other,
}

impl UaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Tv => "tv",
            Self::Stb => "stb",
            Self::StreamingServer => "streaming_server",
            Self::Desktop => "desktop",
            Self::Other => "other",
        }
    }

    /// Parse the persisted string form back into a class. Unknown → Other.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "android" => Self::Android,
            "ios" => Self::Ios,
            "tv" => Self::Tv,
            "stb" => Self::Stb,
            "streaming_server" => Self::StreamingServer,
            "desktop" => Self::Desktop,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for UaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered substring rules; first match wins. STB must be tested before TV
/// because many set-top-box UAs also contain "tv" (MAG, Aura, Dune).
const RULES: &[(&[&str], UaClass)] = &[
    (&["lavf", "ffmpeg", "gstreamer", "curl", "wget", "okhttp"], UaClass::StreamingServer),
    (&["stb", "mag", "aura", "dune", "infomir"], UaClass::Stb),
    (&["smart-tv", "smarttv", "hbbtv", "webos", "tizen", "appletv"], UaClass::Tv),
    (&["android"], UaClass::Android),
    (&["iphone", "ipad", "ios", "cfnetwork", "darwin"], UaClass::Ios),
    (&["windows", "macintosh", "linux", "x11"], UaClass::Desktop),
];

/// Classify a raw user-agent string. Case-insensitive, total, deterministic.
pub fn classify(user_agent: &str) -> UaClass {
    if user_agent.is_empty() {
        return UaClass::Other;
    }
    let ua = user_agent.to_lowercase();
    for (needles, class) in RULES {
        if needles.iter().any(|n| ua.contains(n)) {
            return *class;
        }
    }
    UaClass::Other
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod classify_tests;
