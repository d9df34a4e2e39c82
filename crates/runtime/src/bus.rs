// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe with per-entry acknowledgement.
//!
//! Each subscription owns an unbounded queue and one dispatch task draining
//! it, so publishing never blocks on a slow subscriber and a subscriber sees
//! any single publisher's events in FIFO order. In durable mode every publish
//! is journaled before a subscriber runs; unacked entries re-dispatch after a
//! crash, which is where at-least-once delivery comes from.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sy_core::{Event, EventId, EventKind};
use sy_storage::{Wal, WalEntry, WalError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{ErrorSink, RuntimeError};

pub type BoxFuture<T> = Pin<Box<dyn std::future::Future<Output = T> + Send>>;

/// Subscriber callback. Errors go to the runtime error channel; they never
/// ack the event and never abort the bus.
pub type BusHandler = Arc<dyn Fn(BusEvent) -> BoxFuture<Result<(), RuntimeError>> + Send + Sync>;

/// An event on the bus, tagged with its owning module.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub module: String,
    pub event: Event,
}

/// Conjunction of optional predicates a subscription filters by.
#[derive(Debug, Clone, Default)]
pub struct BusFilter {
    pub module: Option<String>,
    pub source: Option<String>,
    pub kind: Option<EventKind>,
}

impl BusFilter {
    /// Filter matching everything published for one module.
    pub fn for_module(module: impl Into<String>) -> Self {
        Self { module: Some(module.into()), ..Self::default() }
    }

    fn matches(&self, bus_event: &BusEvent) -> bool {
        if self.module.as_deref().is_some_and(|m| m != bus_event.module) {
            return false;
        }
        if self.source.as_deref().is_some_and(|s| s != bus_event.event.source) {
            return false;
        }
        if self.kind.as_ref().is_some_and(|k| *k != bus_event.event.kind) {
            return false;
        }
        true
    }
}

struct PendingEvent {
    seq: u64,
    bus_event: BusEvent,
}

struct SubEntry {
    id: u64,
    filter: BusFilter,
    tx: mpsc::UnboundedSender<BusEvent>,
}

struct BusInner {
    /// Published but not yet acked, keyed by event id.
    pending: Mutex<HashMap<EventId, PendingEvent>>,
    subs: Mutex<Vec<SubEntry>>,
    next_seq: AtomicU64,
    next_sub: AtomicU64,
    wal: Option<Mutex<Wal>>,
    errors: ErrorSink,
    #[cfg(any(test, feature = "test-support"))]
    poison_publishes: AtomicU64,
}

/// Handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    id: u64,
    inner: Arc<BusInner>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop further deliveries. Returns the dispatch task handle so the
    /// caller can await the drain of already-queued events.
    pub fn unsubscribe(self) -> JoinHandle<()> {
        self.inner.subs.lock().retain(|entry| entry.id != self.id);
        self.handle
    }
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// In-memory bus: pending state does not survive the process.
    pub fn new(errors: ErrorSink) -> Self {
        Self::build(None, errors)
    }

    /// Durable bus over an event journal. Entries already in the journal are
    /// loaded as pending; call [`EventBus::redispatch`] once subscribers are
    /// attached to re-deliver them.
    pub fn durable(wal: Wal, errors: ErrorSink) -> Self {
        let bus = Self::build(Some(wal), errors);
        bus.load_journal();
        bus
    }

    fn build(wal: Option<Wal>, errors: ErrorSink) -> Self {
        Self {
            inner: Arc::new(BusInner {
                pending: Mutex::new(HashMap::new()),
                subs: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(0),
                next_sub: AtomicU64::new(0),
                wal: wal.map(Mutex::new),
                errors,
                #[cfg(any(test, feature = "test-support"))]
                poison_publishes: AtomicU64::new(0),
            }),
        }
    }

    /// Make the next `n` publishes fail, for exercising the abort path.
    #[cfg(any(test, feature = "test-support"))]
    pub fn poison_publishes(&self, n: u64) {
        self.inner.poison_publishes.store(n, Ordering::SeqCst);
    }

    fn load_journal(&self) {
        let entries: Vec<WalEntry> = match &self.inner.wal {
            Some(wal) => wal.lock().unacked(),
            None => return,
        };
        let mut pending = self.inner.pending.lock();
        let mut max_seq = 0;
        for entry in entries {
            max_seq = max_seq.max(entry.seq);
            pending.insert(
                entry.event.id,
                PendingEvent {
                    seq: entry.seq,
                    bus_event: BusEvent { module: entry.module, event: entry.event },
                },
            );
        }
        self.inner.next_seq.fetch_max(max_seq, Ordering::SeqCst);
    }

    /// Publish an event tagged with its owning module.
    ///
    /// In durable mode the journal append happens before any subscriber can
    /// observe the event; a journal failure fails the publish.
    pub fn publish(&self, module: &str, event: &Event) -> Result<(), WalError> {
        #[cfg(any(test, feature = "test-support"))]
        {
            let remaining = self.inner.poison_publishes.load(Ordering::SeqCst);
            if remaining > 0 {
                self.inner.poison_publishes.store(remaining - 1, Ordering::SeqCst);
                return Err(WalError::Io(std::io::Error::other("publish poisoned")));
            }
        }
        let seq = match &self.inner.wal {
            Some(wal) => wal.lock().append(module, event)?,
            None => self.inner.next_seq.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let bus_event = BusEvent { module: module.to_string(), event: event.clone() };
        self.inner
            .pending
            .lock()
            .insert(event.id, PendingEvent { seq, bus_event: bus_event.clone() });
        self.dispatch(&bus_event);
        Ok(())
    }

    /// Subscribe with a filter. The handler runs on a dedicated dispatch
    /// task, one event at a time, in publish order.
    pub fn subscribe(&self, filter: BusFilter, handler: BusHandler) -> Subscription {
        let (tx, mut rx) = mpsc::unbounded_channel::<BusEvent>();
        let id = self.inner.next_sub.fetch_add(1, Ordering::SeqCst);
        self.inner.subs.lock().push(SubEntry { id, filter, tx });

        let errors = self.inner.errors.clone();
        let handle = tokio::spawn(async move {
            while let Some(bus_event) = rx.recv().await {
                if let Err(e) = handler(bus_event).await {
                    errors.report(e);
                }
            }
        });

        Subscription { id, inner: Arc::clone(&self.inner), handle }
    }

    /// Remove an event from the pending set; in durable mode, mark the
    /// journal entry complete.
    pub fn ack(&self, event_id: &EventId) -> Result<(), WalError> {
        let removed = self.inner.pending.lock().remove(event_id);
        if let (Some(pending), Some(wal)) = (removed, &self.inner.wal) {
            wal.lock().ack(pending.seq)?;
        }
        Ok(())
    }

    /// Snapshot of events published but not yet acked, in publish order.
    pub fn unacked(&self) -> Vec<BusEvent> {
        let pending = self.inner.pending.lock();
        let ordered: BTreeMap<u64, BusEvent> =
            pending.values().map(|p| (p.seq, p.bus_event.clone())).collect();
        ordered.into_values().collect()
    }

    /// Re-deliver pending events to current subscribers, oldest first.
    ///
    /// With `module` set, only that module's events re-dispatch. Used after
    /// journal recovery, once the owning module's routing is attached.
    pub fn redispatch(&self, module: Option<&str>) {
        for bus_event in self.unacked() {
            if module.is_some_and(|m| m != bus_event.module) {
                continue;
            }
            self.dispatch(&bus_event);
        }
    }

    /// Drop acked journal entries older than the horizon. No-op in-memory.
    pub fn compact(&self, horizon: chrono::DateTime<chrono::Utc>) -> Result<(), WalError> {
        if let Some(wal) = &self.inner.wal {
            wal.lock().compact(horizon)?;
        }
        Ok(())
    }

    /// Flush buffered journal writes. No-op in-memory.
    pub fn flush(&self) -> Result<(), WalError> {
        if let Some(wal) = &self.inner.wal {
            wal.lock().flush()?;
        }
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    fn dispatch(&self, bus_event: &BusEvent) {
        let targets: Vec<mpsc::UnboundedSender<BusEvent>> = {
            let subs = self.inner.subs.lock();
            subs.iter().filter(|s| s.filter.matches(bus_event)).map(|s| s.tx.clone()).collect()
        };
        for tx in targets {
            if tx.send(bus_event.clone()).is_err() {
                // Dispatch task gone; subscription is being torn down.
                warn!(module = %bus_event.module, "dropped bus delivery to closed subscription");
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
