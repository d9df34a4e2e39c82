// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::{EventId, TraceId};
use std::borrow::Borrow;
use std::collections::HashMap;

#[test]
fn generated_ids_carry_prefix_and_fill_the_buffer() {
    let id = EventId::new();
    assert!(id.as_str().starts_with("evt_"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
    assert_eq!(id.suffix().len(), 32);
}

#[test]
fn generated_ids_are_unique() {
    let a = EventId::new();
    let b = EventId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = EventId::from_string("evt_1");
    assert_eq!(id.as_str(), "evt_1");
    assert_eq!(id.suffix(), "1");
    assert_eq!(id, "evt_1");
}

#[test]
fn suffix_without_prefix_returns_whole_id() {
    let id = TraceId::from_string("bare");
    assert_eq!(id.suffix(), "bare");
}

#[test]
fn idbuf_hash_matches_str_for_map_lookup() {
    let mut map: HashMap<EventId, u32> = HashMap::new();
    map.insert(EventId::from_string("evt_abc"), 7);
    // Borrow<str> lookup must find the entry without allocating an EventId.
    assert_eq!(map.get("evt_abc"), Some(&7));
}

#[test]
fn idbuf_empty_is_empty() {
    assert!(IdBuf::empty().is_empty());
    assert_eq!(IdBuf::empty().as_str(), "");
}

#[test]
fn serde_is_transparent() {
    let id = EventId::from_string("evt_42");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"evt_42\"");
    let back: EventId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn borrow_returns_full_id() {
    let id = EventId::from_string("evt_xyz");
    let s: &str = id.borrow();
    assert_eq!(s, "evt_xyz");
}
