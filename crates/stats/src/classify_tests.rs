// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// ── representative pins ───────────────────────────────────────────────

#[test]
fn pins_one_representative_per_class() {
    let pins: &[(&str, UaClass)] = &[
        ("Lavf53.32.100", UaClass::StreamingServer),
        ("Mozilla/5.0 (Linux; Android 13)", UaClass::Android),
        ("AppleTV11,1", UaClass::Tv),
        ("MAG250 STB", UaClass::Stb),
        ("Mozilla/5.0 (Windows NT 10.0)", UaClass::Desktop),
        ("AppleCoreMedia/1.0 (iPhone; U; CPU OS 16_0)", UaClass::Ios),
        ("VLC/3.0.18 SomePlayer", UaClass::Other),
    ];
    for (ua, expected) in pins {
        assert_eq!(classify(ua), *expected, "ua: {ua}");
    }
}

#[test]
fn empty_user_agent_is_other() {
    assert_eq!(classify(""), UaClass::Other);
}

#[test]
fn classification_is_case_insensitive() {
    assert_eq!(classify("FFMPEG/4.4"), UaClass::StreamingServer);
    assert_eq!(classify("ffmpeg/4.4"), UaClass::StreamingServer);
    assert_eq!(classify("HbbTV/1.5.1"), UaClass::Tv);
}

#[test]
fn stb_wins_over_tv_needles() {
    // An STB identifier that also carries a smart-tv marker must classify
    // as stb, not tv.
    assert_eq!(classify("Infomir MAG322 SmartTV-capable"), UaClass::Stb);
    assert_eq!(classify("Dune HD webOS shell"), UaClass::Stb);
}

#[test]
fn streaming_tools_win_over_platform_needles() {
    // curl on Linux is a relay pulling a stream, not a desktop viewer.
    assert_eq!(classify("curl/8.0.1 (x86_64-pc-linux-gnu)"), UaClass::StreamingServer);
    assert_eq!(classify("okhttp/4.11.0 Android"), UaClass::StreamingServer);
}

#[test]
fn every_class_is_reachable_and_none_is_universal() {
    use std::collections::HashSet;
    let seen: HashSet<UaClass> = [
        "Lavf57", "MAG254", "SmartTV Tizen 6.0", "Android 12; Pixel", "iPad; CPU OS 15",
        "X11; Ubuntu", "weird-player/1.0",
    ]
    .iter()
    .map(|ua| classify(ua))
    .collect();
    assert_eq!(seen.len(), 7, "all seven classes must be reachable");
}

#[test]
fn same_input_same_output() {
    let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_2)";
    let first = classify(ua);
    for _ in 0..50 {
        assert_eq!(classify(ua), first);
    }
}
