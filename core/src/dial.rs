//! Charge Dial
//!
//! Turns quantized rotary ticks into charge units. The sensor collaborator
//! counts raw encoder pulses and calls [`Dial::tick`] once per quantized
//! step, from whatever thread it owns; everything from there - full
//! rotations, charge units, self-pausing at full charge - happens here.
//!
//! The dial is the "work" half of the readiness gate: a reply is never
//! shown until the user has cranked the wheel to full charge. Charging only
//! counts when the device has asked for it; while disarmed, ticks are
//! ignored outright rather than buffered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DialSettings;
use crate::events::{Event, EventKind};
use crate::queue::EventQueue;

/// Direction of one quantized rotary tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Forward crank.
    Clockwise,
    /// Backward crank.
    CounterClockwise,
}

/// Counters for the current charge cycle. Mutated only inside `tick`,
/// under one lock, because ticks may arrive from any sensor thread.
struct ChargeState {
    /// Signed quantized steps toward the next full rotation.
    steps: i32,
    /// Signed completed full rotations; fractional turns never count.
    rotations: i32,
    /// Zero-based index of the last charge unit earned; -1 before the
    /// first.
    progress_units: i8,
}

/// The charge-gesture input source.
pub struct Dial {
    armed: AtomicBool,
    state: Mutex<ChargeState>,
    events: Arc<EventQueue<Event>>,
    settings: DialSettings,
}

impl Dial {
    /// Create a disarmed dial that emits into `events`.
    pub fn new(events: Arc<EventQueue<Event>>, settings: DialSettings) -> Self {
        Self {
            armed: AtomicBool::new(false),
            state: Mutex::new(ChargeState {
                steps: 0,
                rotations: 0,
                progress_units: -1,
            }),
            events,
            settings,
        }
    }

    /// Start accepting ticks. Called by the Controller when a submission
    /// is accepted.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
        tracing::debug!("dial armed");
    }

    /// Stop accepting ticks.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        tracing::debug!("dial disarmed");
    }

    /// Whether the dial currently accepts ticks.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Deliver one quantized tick from the rotation sensor.
    ///
    /// Every `rotations_per_unit` completed full rotations advance one
    /// charge unit and push
    /// [`ChargeProgress`](EventKind::ChargeProgress); the final unit
    /// additionally pushes [`ChargeComplete`](EventKind::ChargeComplete),
    /// resets all counters, and disarms the dial until the next cycle.
    pub fn tick(&self, direction: Direction) {
        if !self.is_armed() {
            return;
        }

        let mut state = self.state.lock();
        state.steps += match direction {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        };

        if state.steps.unsigned_abs() < self.settings.ticks_per_rev {
            return;
        }

        state.rotations += if state.steps > 0 { 1 } else { -1 };
        state.steps = 0;
        tracing::debug!(rotations = state.rotations, "full rotation completed");

        if state.rotations % self.settings.rotations_per_unit as i32 != 0 {
            return;
        }

        state.progress_units += 1;
        let unit = state.progress_units as u8;
        self.events
            .push(Event::new(EventKind::ChargeProgress { unit }));
        tracing::info!(unit, "charge unit earned");

        if u32::from(unit) + 1 >= u32::from(self.settings.max_units) {
            self.events.push(Event::new(EventKind::ChargeComplete));
            state.steps = 0;
            state.rotations = 0;
            state.progress_units = -1;
            self.armed.store(false, Ordering::SeqCst);
            tracing::info!("charge complete, dial disarmed");
        }
    }

    /// Current zero-based progress (-1 before the first unit).
    pub fn progress_units(&self) -> i8 {
        self.state.lock().progress_units
    }

    /// Current signed full-rotation count within this cycle.
    pub fn rotation_count(&self) -> i32 {
        self.state.lock().rotations
    }
}
