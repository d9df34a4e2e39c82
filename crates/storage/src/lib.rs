// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sy-storage: Durable state for the Switchyard runtime
//!
//! The write-ahead log gives the bus at-least-once delivery across process
//! crashes; the checkpoint store lets sources resume polling where they left
//! off; the state layout fixes where everything lives on disk.

mod checkpoint;
mod paths;
mod wal;

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use paths::StateLayout;
pub use wal::{Wal, WalEntry, WalError};
