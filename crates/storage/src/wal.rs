// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event journal backing the durable bus variant.
//!
//! The file is JSON lines, two record shapes: a published event entry and an
//! ack marking that entry complete. Acks are journaled per entry rather than
//! as a low-water mark because events finish out of order: an event is acked
//! only when every route that matched it has finished.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sy_core::Event;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAL serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One unacked journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub module: String,
    pub event: Event,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum WalRecord {
    Entry(WalEntry),
    Ack { seq: u64 },
}

/// Append-only journal with per-entry acknowledgement.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    /// seq → (entry, acked). Trimmed by [`Wal::compact`].
    entries: BTreeMap<u64, (WalEntry, bool)>,
}

impl Wal {
    /// Open (or create) the journal, scanning existing records to recover
    /// the sequence counter and ack state. A torn trailing line from a crash
    /// mid-write is tolerated with a warning; anything after it is dropped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries: BTreeMap<u64, (WalEntry, bool)> = BTreeMap::new();
        let mut write_seq = 0;
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<WalRecord>(&line) {
                    Ok(WalRecord::Entry(entry)) => {
                        write_seq = write_seq.max(entry.seq);
                        entries.insert(entry.seq, (entry, false));
                    }
                    Ok(WalRecord::Ack { seq }) => {
                        if let Some((_, acked)) = entries.get_mut(&seq) {
                            *acked = true;
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), line = lineno + 1, "stopping WAL scan at corrupt record: {}", e);
                        break;
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, writer: BufWriter::new(file), write_seq, entries })
    }

    /// Append a published event. The record is flushed to the OS before this
    /// returns so a subscriber never runs ahead of the journal.
    pub fn append(&mut self, module: &str, event: &Event) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, module: module.to_string(), event: event.clone() };
        self.write_record(&WalRecord::Entry(entry.clone()))?;
        self.writer.flush()?;
        self.entries.insert(entry.seq, (entry, false));
        Ok(self.write_seq)
    }

    /// Mark an entry complete.
    pub fn ack(&mut self, seq: u64) -> Result<(), WalError> {
        self.write_record(&WalRecord::Ack { seq })?;
        self.writer.flush()?;
        if let Some((_, acked)) = self.entries.get_mut(&seq) {
            *acked = true;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Snapshot of entries published but not yet acked, in seq order.
    pub fn unacked(&self) -> Vec<WalEntry> {
        self.entries
            .values()
            .filter(|(_, acked)| !acked)
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Rewrite the journal keeping every unacked entry plus acked entries
    /// whose event timestamp is at or after `horizon`.
    pub fn compact(&mut self, horizon: DateTime<Utc>) -> Result<(), WalError> {
        self.writer.flush()?;

        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for (entry, acked) in self.entries.values() {
                if *acked && entry.event.timestamp < horizon {
                    continue;
                }
                serde_json::to_writer(&mut out, &WalRecord::Entry(entry.clone()))?;
                out.write_all(b"\n")?;
                if *acked {
                    serde_json::to_writer(&mut out, &WalRecord::Ack { seq: entry.seq })?;
                    out.write_all(b"\n")?;
                }
            }
            out.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        self.entries.retain(|_, (entry, acked)| !*acked || entry.event.timestamp >= horizon);
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }

    fn write_record(&mut self, record: &WalRecord) -> Result<(), WalError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
