// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration as ChronoDuration;
use std::io::Write as _;
use sy_core::{Event, EventKind};
use tempfile::tempdir;

fn test_event(n: u64) -> Event {
    let mut event = Event::new("gh", EventKind::ResourceChanged, Utc::now());
    event.payload.insert("n".to_string(), serde_json::json!(n));
    event
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    let wal = Wal::open(&path).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
    assert!(wal.unacked().is_empty());
}

#[test]
fn append_assigns_increasing_seqs() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("events.wal")).unwrap();

    let seq1 = wal.append("eng", &test_event(1)).unwrap();
    let seq2 = wal.append("eng", &test_event(2)).unwrap();

    assert_eq!(seq1, 1);
    assert_eq!(seq2, 2);
    assert_eq!(wal.unacked().len(), 2);
}

#[test]
fn ack_removes_from_unacked() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("events.wal")).unwrap();

    let seq1 = wal.append("eng", &test_event(1)).unwrap();
    wal.append("eng", &test_event(2)).unwrap();

    wal.ack(seq1).unwrap();

    let unacked = wal.unacked();
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].seq, 2);
}

#[test]
fn out_of_order_acks() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("events.wal")).unwrap();

    wal.append("eng", &test_event(1)).unwrap();
    let seq2 = wal.append("eng", &test_event(2)).unwrap();
    let seq3 = wal.append("eng", &test_event(3)).unwrap();

    wal.ack(seq3).unwrap();
    wal.ack(seq2).unwrap();

    let unacked = wal.unacked();
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].seq, 1);
}

#[test]
fn reopen_recovers_seq_and_ack_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append("eng", &test_event(1)).unwrap();
        let seq2 = wal.append("eng", &test_event(2)).unwrap();
        wal.ack(seq2).unwrap();
    }

    let mut wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let unacked = wal.unacked();
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].seq, 1);
    assert_eq!(unacked[0].module, "eng");

    // New appends continue after the recovered seq.
    assert_eq!(wal.append("eng", &test_event(3)).unwrap(), 3);
}

#[test]
fn torn_trailing_line_is_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append("eng", &test_event(1)).unwrap();
    }
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"op\":\"entry\",\"seq\":2,\"modu").unwrap();

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 1);
    assert_eq!(wal.unacked().len(), 1);
}

#[test]
fn compact_drops_old_acked_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");
    let mut wal = Wal::open(&path).unwrap();

    let seq1 = wal.append("eng", &test_event(1)).unwrap();
    wal.append("eng", &test_event(2)).unwrap();
    wal.ack(seq1).unwrap();

    // Everything so far is older than the horizon.
    wal.compact(Utc::now() + ChronoDuration::seconds(1)).unwrap();

    let unacked = wal.unacked();
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].seq, 2);

    // The acked entry is gone from disk too.
    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.unacked().len(), 1);
    assert_eq!(wal.write_seq(), 2);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 1);
}

#[test]
fn compact_keeps_recent_acked_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.wal");
    let mut wal = Wal::open(&path).unwrap();

    let seq1 = wal.append("eng", &test_event(1)).unwrap();
    wal.ack(seq1).unwrap();

    // Horizon in the past: the acked entry is retained.
    wal.compact(Utc::now() - ChronoDuration::hours(1)).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(wal.unacked().is_empty());
}

#[test]
fn appends_work_after_compact() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("events.wal")).unwrap();

    let seq1 = wal.append("eng", &test_event(1)).unwrap();
    wal.ack(seq1).unwrap();
    wal.compact(Utc::now() + ChronoDuration::seconds(1)).unwrap();

    let seq2 = wal.append("eng", &test_event(2)).unwrap();
    assert_eq!(seq2, 2);
    assert_eq!(wal.unacked().len(), 1);
}
