//! Blocking Event Queue
//!
//! The shared FIFO that every producer in the device pushes into and that
//! exactly one consumer drains. Two instances exist at runtime: the device
//! event queue consumed by the [`Controller`](crate::controller::Controller)
//! and the display worker's private render-request queue. Both need the same
//! three operations, so the queue is generic over its element type.
//!
//! # Contract
//!
//! - `push` never blocks and never fails (the queue is unbounded; event
//!   volume is human-paced).
//! - `pop_timeout` blocks up to the given duration, then returns `None`.
//!   An empty pop is expected control flow, not an error - it is the
//!   cooperative checkpoint that keeps shutdown responsive without
//!   busy-waiting.
//! - `drain` atomically removes everything currently queued. Elements
//!   pushed after `drain` returns are preserved; no push is ever lost and
//!   no pre-drain element survives. This is what implements queue-jump
//!   semantics: a finalized submission discards every stale progress event
//!   queued before it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Depth at which a queue starts complaining. Event volume is human-paced;
/// reaching this many queued elements means a producer is misbehaving.
const HIGH_WATER: usize = 1024;

/// Thread-safe unbounded FIFO with blocking pop and atomic drain.
pub struct EventQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> EventQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an element. Never blocks.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        items.push_back(item);
        if items.len() == HIGH_WATER {
            tracing::warn!(depth = items.len(), "queue high-water mark reached");
        }
        // Single consumer, so one waiter at most.
        self.available.notify_one();
    }

    /// Remove the oldest element, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout. Spurious condvar wakeups are absorbed by
    /// re-checking against the deadline.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Atomically discard every queued element, returning how many were
    /// dropped.
    pub fn drain(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "drained queued elements");
        }
        dropped
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
