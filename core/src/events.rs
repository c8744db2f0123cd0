//! Device Events
//!
//! Events pushed by the dial, the model worker, and the process lifecycle
//! into the shared queue, and consumed only by the
//! [`Controller`](crate::controller::Controller). These are the device's
//! single source of cross-component truth: completion payloads ride the
//! events themselves, so no component needs to read another's state.
//!
//! # Design Philosophy
//!
//! Producers are "dumb" - they report what happened (a charge unit
//! advanced, a line was finalized, a reply arrived) and never decide what
//! the display should do about it. The Controller owns that mapping.

use serde::{Deserialize, Serialize};

/// A single occurrence in the device, queued for dispatch.
///
/// Immutable once constructed; created at the producer, consumed and
/// discarded by the Controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// What happened, with any payload it carries.
    pub kind: EventKind,
    /// When the event was created (Unix timestamp ms).
    pub created_at: u64,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            created_at: now_ms(),
        }
    }

    /// Short name of the event kind, for log lines.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::KeyboardProgress { .. } => "KeyboardProgress",
            EventKind::InputFinalized { .. } => "InputFinalized",
            EventKind::ChargeProgress { .. } => "ChargeProgress",
            EventKind::ChargeComplete => "ChargeComplete",
            EventKind::ModelResponse { .. } => "ModelResponse",
            EventKind::Shutdown => "Shutdown",
        }
    }
}

/// The closed set of things that can happen in the device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A coalesced batch of keystrokes was accepted; the on-screen echo of
    /// the partial input should refresh.
    KeyboardProgress {
        /// The line buffer as of this batch.
        partial: String,
    },

    /// The user pressed enter. Every event queued before this one has
    /// already been discarded (queue-jump).
    InputFinalized {
        /// The finalized line.
        text: String,
    },

    /// The dial advanced one charge unit.
    ChargeProgress {
        /// Zero-based index of the unit just earned.
        unit: u8,
    },

    /// The dial reached full charge and disarmed itself.
    ChargeComplete,

    /// The model worker finished a cycle. Backend failures arrive here too,
    /// as an error-formatted reply - the Controller renders them the same
    /// way.
    ModelResponse {
        /// The assistant reply (or error text).
        reply: String,
    },

    /// Orderly shutdown of all workers was requested.
    Shutdown,
}

/// Get current timestamp in milliseconds.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_stamped() {
        let event = Event::new(EventKind::ChargeComplete);
        assert!(event.created_at > 0);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(Event::new(EventKind::Shutdown).name(), "Shutdown");
        assert_eq!(
            Event::new(EventKind::ChargeProgress { unit: 0 }).name(),
            "ChargeProgress"
        );
        assert_eq!(
            Event::new(EventKind::ModelResponse {
                reply: "hi".to_string()
            })
            .name(),
            "ModelResponse"
        );
    }
}
