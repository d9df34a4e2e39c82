// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn layout_paths_are_rooted_in_state_dir() {
    let layout = StateLayout::new("/tmp/sy-test");
    assert_eq!(layout.pid_path, PathBuf::from("/tmp/sy-test/daemon.pid"));
    assert_eq!(layout.port_path, PathBuf::from("/tmp/sy-test/control.port"));
    assert_eq!(layout.wal_path, PathBuf::from("/tmp/sy-test/wal/events.wal"));
    assert_eq!(layout.modules_dir, PathBuf::from("/tmp/sy-test/modules"));
}

#[test]
fn ensure_dirs_creates_the_tree() {
    let dir = tempdir().unwrap();
    let layout = StateLayout::new(dir.path().join("state"));
    layout.ensure_dirs().unwrap();

    assert!(layout.state_dir.is_dir());
    assert!(layout.wal_path.parent().unwrap().is_dir());
    assert!(layout.modules_dir.is_dir());
}

#[test]
fn ensure_dirs_is_idempotent() {
    let dir = tempdir().unwrap();
    let layout = StateLayout::new(dir.path().join("state"));
    layout.ensure_dirs().unwrap();
    layout.ensure_dirs().unwrap();
}
