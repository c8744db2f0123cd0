//! Key Capture
//!
//! The line-capture phase of the model worker's cycle. A [`KeySource`]
//! collaborator (hardware keyboard, raw-mode terminal, scripted test
//! driver) delivers individual [`Key`] events into a [`LineCapture`] sink,
//! which owns the pending keystroke buffer until the user presses enter.
//!
//! Two things happen on the capture side rather than in the worker loop,
//! because they must occur at the keystroke's moment of arrival:
//!
//! - every Nth accepted keystroke pushes a coalesced
//!   [`KeyboardProgress`](crate::events::EventKind::KeyboardProgress)
//!   event, bounding display churn to a fraction of the typing rate;
//! - enter atomically drains the shared event queue before pushing
//!   [`InputFinalized`](crate::events::EventKind::InputFinalized) - once
//!   the user commits a line, every partial-state event queued during
//!   typing is stale by definition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::events::{Event, EventKind};
use crate::queue::EventQueue;

/// A single key delivered by the key-capture collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// A printable character.
    Char(char),
    /// The space bar.
    Space,
    /// Backspace; removes the last buffered character, no-op when empty.
    Backspace,
    /// Enter; finalizes the line.
    Enter,
}

/// Receiver of key events. Implemented by [`LineCapture`]; key sources only
/// ever see this trait.
pub trait KeySink: Send + Sync {
    /// Deliver one key.
    fn key(&self, key: Key);
}

/// Key-capture collaborator.
///
/// `start` begins delivering keys to the sink; `stop` ceases delivery.
/// Keys arriving while stopped are discarded, not buffered. A source is
/// started and stopped once per worker cycle.
pub trait KeySource: Send {
    /// Begin delivering key events to `sink`.
    fn start(&mut self, sink: Arc<dyn KeySink>);

    /// Stop delivering key events.
    fn stop(&mut self);
}

/// Mutable capture state, guarded as one unit because the key callback
/// arrives on the key source's thread while the worker waits on it.
struct CaptureState {
    buffer: String,
    accepted: u32,
    finalized: bool,
}

/// The pending keystroke buffer and its finalize handshake.
pub struct LineCapture {
    state: Mutex<CaptureState>,
    finalized: Condvar,
    events: Arc<EventQueue<Event>>,
    echo_every: u32,
}

impl LineCapture {
    /// Create a capture that pushes progress/finalize events into `events`,
    /// echoing every `echo_every` accepted keystrokes (0 disables echo).
    pub fn new(events: Arc<EventQueue<Event>>, echo_every: u32) -> Self {
        Self {
            state: Mutex::new(CaptureState {
                buffer: String::new(),
                accepted: 0,
                finalized: false,
            }),
            finalized: Condvar::new(),
            events,
            echo_every,
        }
    }

    /// Clear the buffer and re-arm for a new capture cycle.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.buffer.clear();
        state.accepted = 0;
        state.finalized = false;
    }

    /// Block until the line is finalized, returning the captured text.
    ///
    /// Re-checks `stop` every `poll` so worker shutdown is never delayed by
    /// more than one polling interval; returns `None` if stopped first.
    pub fn wait_finalized(&self, stop: &AtomicBool, poll: Duration) -> Option<String> {
        let mut state = self.state.lock();
        loop {
            if state.finalized {
                return Some(std::mem::take(&mut state.buffer));
            }
            if stop.load(Ordering::SeqCst) {
                return None;
            }
            self.finalized.wait_for(&mut state, poll);
        }
    }

    /// Snapshot of the current buffer contents.
    pub fn buffer(&self) -> String {
        self.state.lock().buffer.clone()
    }
}

impl KeySink for LineCapture {
    fn key(&self, key: Key) {
        let mut state = self.state.lock();
        // Between enter and the next reset() the capture is closed; a key
        // source that is slow to stop must not bleed into the next cycle.
        if state.finalized {
            return;
        }

        match key {
            Key::Char(c) => {
                state.buffer.push(c);
                state.accepted += 1;
            }
            Key::Space => {
                state.buffer.push(' ');
                state.accepted += 1;
            }
            Key::Backspace => {
                state.buffer.pop();
                state.accepted += 1;
            }
            Key::Enter => {
                let dropped = self.events.drain();
                tracing::debug!(dropped, "input finalized, queue-jumped stale events");
                self.events.push(Event::new(EventKind::InputFinalized {
                    text: state.buffer.clone(),
                }));
                state.finalized = true;
                state.accepted = 0;
                self.finalized.notify_all();
                return;
            }
        }

        if self.echo_every > 0 && state.accepted >= self.echo_every {
            state.accepted = 0;
            self.events.push(Event::new(EventKind::KeyboardProgress {
                partial: state.buffer.clone(),
            }));
        }
    }
}
