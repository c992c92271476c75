//! Diagnostics bus: bounded event history with live fan-out.
//!
//! Every component logs through `tracing`; [`DiagnosticsLayer`] turns each
//! tracing event into a [`LogEvent`] and emits it here. Presentation layers
//! query the history or subscribe for a live stream.
//!
//! ## Guarantees
//! - The ring buffer never exceeds `max_entries`; the oldest event is evicted.
//! - `emit()` never blocks on a subscriber and never fails the producer.
//!   A full subscriber channel misses the event; a closed one is pruned
//!   after the fan-out pass.
//! - Each subscriber sees events in emission order (fan-out runs under the
//!   bus lock, and every send is a non-blocking `try_send`).
//!
//! Nothing in this module may log through `tracing`: the layer calls back
//! into `emit()` and the bus lock is not re-entrant.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, SecondsFormat};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use sand_common::config::{DiagnosticsConfig, LogLevel};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod layer;

pub use layer::DiagnosticsLayer;

// ─── Events ─────────────────────────────────────────────────────────

/// One captured log record. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// ISO-8601 local time with milliseconds.
    pub timestamp: String,
    #[serde(serialize_with = "level_out", deserialize_with = "level_in")]
    pub level: LogLevel,
    /// Emitting module (tracing target).
    pub source: String,
    /// Source line, 0 when unknown.
    pub line: u32,
    pub message: String,
}

impl LogEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        level: LogLevel,
        source: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            level,
            source: source.into(),
            line,
            message: message.into(),
        }
    }
}

fn level_out<S: Serializer>(level: &LogLevel, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(level.as_str())
}

fn level_in<'de, D: Deserializer<'de>>(d: D) -> Result<LogLevel, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
}

// ─── Subscribers ────────────────────────────────────────────────────

/// Identifies a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Receiving end of a live event stream.
///
/// Dropping it closes the channel; the bus prunes it on the next emit.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<LogEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<LogEvent> {
        &self.receiver
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<LogEvent> {
        self.receiver.try_iter().collect()
    }
}

// ─── Bus ────────────────────────────────────────────────────────────

struct BusInner {
    buffer: VecDeque<LogEvent>,
    subscribers: Vec<(SubscriberId, Sender<LogEvent>)>,
}

/// Process-wide event history and fan-out point.
pub struct DiagnosticsBus {
    inner: Mutex<BusInner>,
    max_entries: usize,
    subscriber_capacity: usize,
    next_id: AtomicU64,
    dropped: AtomicU64,
}

impl DiagnosticsBus {
    /// Create a bus; zero capacities are raised to 1.
    pub fn new(max_entries: usize, subscriber_capacity: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: Mutex::new(BusInner {
                buffer: VecDeque::with_capacity(max_entries),
                subscribers: Vec::new(),
            }),
            max_entries,
            subscriber_capacity: subscriber_capacity.max(1),
            next_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self::new(config.max_entries, config.subscriber_capacity)
    }

    /// Record an event and fan it out.
    pub fn emit(&self, event: LogEvent) {
        let mut inner = self.inner.lock();
        let mut dead: Vec<SubscriberId> = Vec::new();

        for (id, tx) in &inner.subscribers {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => dead.push(*id),
            }
        }
        if !dead.is_empty() {
            inner.subscribers.retain(|(id, _)| !dead.contains(id));
        }

        if inner.buffer.len() == self.max_entries {
            inner.buffer.pop_front();
        }
        inner.buffer.push_back(event);
    }

    /// Matching events, newest first.
    ///
    /// `level` selects events of exactly that level.
    pub fn query(&self, limit: Option<usize>, level: Option<LogLevel>) -> Vec<LogEvent> {
        let inner = self.inner.lock();
        inner
            .buffer
            .iter()
            .rev()
            .filter(|e| level.is_none_or(|l| e.level == l))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Open a new bounded live stream.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded(self.subscriber_capacity);
        self.inner.lock().subscribers.push((id, tx));
        Subscription { id, receiver: rx }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Empty the history. Subscribers are unaffected.
    pub fn clear(&self) {
        self.inner.lock().buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Deliveries skipped because a subscriber channel was full.
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for DiagnosticsBus {
    fn default() -> Self {
        Self::from_config(&DiagnosticsConfig::default())
    }
}
