// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! At-least-once delivery through the journal-backed bus.

use super::*;
use sy_core::Phase;
use sy_storage::Wal;

#[tokio::test]
async fn durable_runtime_acks_after_delivery() {
    let rig = TestRig::new().durable();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();

    rig.runtime.inject("eng", test_event("gh", "resource.changed")).await.unwrap();
    rig.settle().await;

    assert_eq!(module.actors["agent"].delivery_count(), 1);
    // Journal entry is acked once the route finished.
    let wal = Wal::open(rig.wal_path()).unwrap();
    assert!(wal.unacked().is_empty());
}

#[tokio::test]
async fn unacked_journal_entries_redeliver_after_restart() {
    let rig = TestRig::new();
    let wal_path = rig.wal_path();

    // Simulate a crash mid-flight: an entry journaled but never acked.
    let orphaned = test_event("gh", "resource.changed");
    {
        let mut wal = Wal::open(&wal_path).unwrap();
        wal.append("eng", &orphaned).unwrap();
    }

    let rig = rig.durable();
    rig.runtime.start().await;

    // Loading the module attaches routing and re-dispatches the pending
    // journal entry for it.
    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();
    rig.settle().await;

    let delivered = module.actors["agent"].delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, orphaned.id);
    assert!(module.logger.has_phase(Phase::DeliverSuccess));

    // Once delivered, the entry is acked for good.
    rig.runtime.stop().await;
    let wal = Wal::open(&wal_path).unwrap();
    assert!(wal.unacked().is_empty());
}

#[tokio::test]
async fn replay_is_scoped_to_the_loaded_module() {
    let rig = TestRig::new();
    let wal_path = rig.wal_path();

    let eng_event = test_event("gh", "resource.changed");
    let ops_event = test_event("ci", "resource.changed");
    {
        let mut wal = Wal::open(&wal_path).unwrap();
        wal.append("eng", &eng_event).unwrap();
        wal.append("ops", &ops_event).unwrap();
    }

    let rig = rig.durable();
    rig.runtime.start().await;

    let module = TestModule::new("eng").source("gh").actor("agent").route("r1", "gh", &[], "agent");
    rig.runtime.load_module(module.config.clone(), module.connectors()).await.unwrap();
    wait_until(|| module.actors["agent"].delivery_count() == 1).await;

    // The ops entry stays pending until its module loads.
    assert_eq!(rig.runtime.status().pending_events, 1);
}

#[tokio::test]
async fn status_reports_durable_mode() {
    let rig = TestRig::new().durable();
    rig.runtime.start().await;
    assert!(rig.runtime.status().durable);
}
