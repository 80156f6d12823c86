//! Bounded edge-event queue.
//!
//! Producers hold cloneable [`EdgeEventSender`]s, possibly on other threads;
//! the engine drains the queue at the start of every step.
//!
//! # Backpressure
//!
//! The main channel is bounded.  When it is full:
//!
//! - **Up/Down** events spill into an unbounded overflow channel.  They are
//!   never lost.
//! - **Degraded** events are coalesced: one pending slot per edge holds the
//!   newest report, and an older report never replaces a newer one.  Each
//!   superseded report is counted.
//!
//! Every event carries a global sequence number, so [`EdgeEventQueue::drain`]
//! restores submission order across both channels and the coalesced slots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use rustc_hash::FxHashMap;

use rr_core::EdgeId;
use rr_graph::EdgeState;

use crate::{ReplanError, ReplanResult};

/// One reported edge-state change, as submitted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgeEvent {
    pub seq:   u64,
    pub edge:  EdgeId,
    pub state: EdgeState,
}

/// What happened to a submitted event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Queued { seq: u64 },
    /// Main channel full; a critical event went to the overflow channel.
    Overflowed { seq: u64 },
    /// Main channel full; a Degraded event took the edge's coalescing slot.
    Coalesced { seq: u64 },
    /// Main channel full; a newer Degraded report for the edge was already
    /// waiting, so this one was discarded.
    Superseded { seq: u64 },
}

#[derive(Debug, Default)]
struct Counters {
    next_seq: AtomicU64,
    dropped:  AtomicU64,
}

/// Newest backpressured Degraded report per edge.
#[derive(Debug, Default)]
struct Coalesced(Mutex<FxHashMap<EdgeId, EdgeEvent>>);

impl Coalesced {
    fn lock(&self) -> MutexGuard<'_, FxHashMap<EdgeId, EdgeEvent>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle.
#[derive(Clone, Debug)]
pub struct EdgeEventSender {
    main:      Sender<EdgeEvent>,
    overflow:  Sender<EdgeEvent>,
    coalesced: Arc<Coalesced>,
    counters:  Arc<Counters>,
}

impl EdgeEventSender {
    /// Submit a state report for `edge`.  Never blocks.
    pub fn send(&self, edge: EdgeId, state: EdgeState) -> ReplanResult<SendOutcome> {
        let seq = self.counters.next_seq.fetch_add(1, Ordering::Relaxed);
        let event = EdgeEvent { seq, edge, state };
        match self.main.try_send(event) {
            Ok(()) => Ok(SendOutcome::Queued { seq }),
            Err(TrySendError::Full(event)) if event.state.is_critical() => {
                self.overflow.send(event).map_err(|_| ReplanError::QueueClosed)?;
                Ok(SendOutcome::Overflowed { seq })
            }
            Err(TrySendError::Full(event)) => Ok(self.coalesce(event)),
            Err(TrySendError::Disconnected(_)) => Err(ReplanError::QueueClosed),
        }
    }

    /// Keep `event` in its edge's slot unless a newer report is waiting.
    fn coalesce(&self, event: EdgeEvent) -> SendOutcome {
        let mut slots = self.coalesced.lock();
        let waiting = slots.get(&event.edge).map(|w| w.seq);
        if waiting.is_some_and(|seq| seq > event.seq) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return SendOutcome::Superseded { seq: event.seq };
        }
        slots.insert(event.edge, event);
        if let Some(older) = waiting {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(edge = %event.edge, older, seq = event.seq, "degraded report superseded");
        } else {
            tracing::warn!(edge = %event.edge, state = %event.state, "edge event queue full, degraded report coalesced");
        }
        SendOutcome::Coalesced { seq: event.seq }
    }
}

/// Consumer side, owned by the engine.
#[derive(Debug)]
pub struct EdgeEventQueue {
    sender:      EdgeEventSender,
    main_rx:     Receiver<EdgeEvent>,
    overflow_rx: Receiver<EdgeEvent>,
    capacity:    usize,
}

impl EdgeEventQueue {
    pub fn new(capacity: usize) -> Self {
        let (main, main_rx) = channel::bounded(capacity.max(1));
        let (overflow, overflow_rx) = channel::unbounded();
        Self {
            sender: EdgeEventSender {
                main,
                overflow,
                coalesced: Arc::new(Coalesced::default()),
                counters: Arc::new(Counters::default()),
            },
            main_rx,
            overflow_rx,
            capacity: capacity.max(1),
        }
    }

    /// A new producer handle.
    pub fn sender(&self) -> EdgeEventSender {
        self.sender.clone()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events waiting in either channel or a coalescing slot.
    pub fn len(&self) -> usize {
        self.main_rx.len() + self.overflow_rx.len() + self.sender.coalesced.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total Degraded reports superseded by a newer one under backpressure.
    pub fn dropped(&self) -> u64 {
        self.sender.counters.dropped.load(Ordering::Relaxed)
    }

    /// Take every queued event, in submission order.
    pub fn drain(&self) -> Vec<EdgeEvent> {
        let mut events: Vec<EdgeEvent> = self.main_rx.try_iter().collect();
        events.extend(self.overflow_rx.try_iter());
        events.extend(self.sender.coalesced.lock().drain().map(|(_, e)| e));
        events.sort_unstable_by_key(|e| e.seq);
        events
    }
}
