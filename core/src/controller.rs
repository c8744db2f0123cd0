//! Device Controller
//!
//! The orchestration core. The Controller owns the shared event queue and
//! is its sole consumer; it maps each event onto render requests and dial
//! state, enforces the both-conditions readiness gate, and owns the
//! orderly shutdown of every worker.
//!
//! # Design Philosophy
//!
//! Producers never talk to each other. The dial does not know a model
//! exists; the model worker does not know the panel exists. Everything
//! meets in the dispatch loop, which is single-threaded - that one fact is
//! what makes the readiness gate race-free: ChargeComplete and
//! ModelResponse may arrive in either order or back to back, but only this
//! thread ever evaluates the gate, and taking the pending reply empties
//! the slot the moment it fires.
//!
//! # The Readiness Gate
//!
//! A reply is shown only when both of these have happened since the last
//! showing:
//! - the dial reached full charge (`charge_complete`),
//! - the model worker delivered a reply (`pending_reply`).
//!
//! Both slots are plain fields on the Controller; they are cleared
//! together, atomically from every other thread's point of view, when the
//! gate fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::LanguageModel;
use crate::capture::KeySource;
use crate::config::DeviceConfig;
use crate::conversation::Conversation;
use crate::dial::Dial;
use crate::display::DisplayWorker;
use crate::events::{Event, EventKind};
use crate::queue::EventQueue;
use crate::render::{RenderRequest, Renderer};
use crate::transcript::TranscriptJournal;
use crate::worker::ModelWorker;

/// The coordination core of the device.
pub struct Controller {
    events: Arc<EventQueue<Event>>,
    dial: Arc<Dial>,
    display: DisplayWorker,
    worker: ModelWorker,
    stop: Arc<AtomicBool>,
    poll_interval: std::time::Duration,
    /// Gate slot: the reply waiting for the charge to finish.
    pending_reply: Option<String>,
    /// Gate slot: whether the dial reached full charge since the last
    /// showing.
    charge_complete: bool,
}

impl Controller {
    /// Assemble the device: spawn the display and model workers and wire
    /// the dial, all against the shared event queue.
    ///
    /// The dial starts disarmed; it is armed each time a submission is
    /// accepted.
    pub fn new(
        config: &DeviceConfig,
        backend: Arc<dyn LanguageModel>,
        renderer: Box<dyn Renderer>,
        keys: Box<dyn KeySource>,
    ) -> Self {
        tracing::info!("assembling device controller");

        let events = Arc::new(EventQueue::new());
        let poll_interval = config.runtime.poll_interval;

        let dial = Arc::new(Dial::new(Arc::clone(&events), config.dial));
        let display = DisplayWorker::spawn(renderer, poll_interval);
        let worker = ModelWorker::spawn(
            Arc::clone(&events),
            keys,
            backend,
            TranscriptJournal::new(config.transcript.path.clone()),
            Conversation::new(config.model.system_prompt.clone()),
            config.input.echo_every,
            poll_interval,
        );

        Self {
            events,
            dial,
            display,
            worker,
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval,
            pending_reply: None,
            charge_complete: false,
        }
    }

    /// Handle to the shared event queue, for external producers (the
    /// process lifecycle pushes [`EventKind::Shutdown`] here).
    pub fn events(&self) -> Arc<EventQueue<Event>> {
        Arc::clone(&self.events)
    }

    /// Handle to the dial, for wiring the rotation sensor.
    pub fn dial(&self) -> Arc<Dial> {
        Arc::clone(&self.dial)
    }

    /// Flag that makes the dispatch loop exit at its next checkpoint.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run the dispatch loop until a Shutdown event arrives or the stop
    /// flag is raised, then shut every worker down and return.
    pub fn run(&mut self) {
        tracing::info!("dispatch loop started");

        loop {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!("stop flag raised");
                break;
            }

            // Empty pops are the cooperative shutdown checkpoint.
            let Some(event) = self.events.pop_timeout(self.poll_interval) else {
                continue;
            };
            tracing::debug!(event = event.name(), "dispatching");

            match event.kind {
                EventKind::Shutdown => {
                    tracing::info!("shutdown event received");
                    break;
                }

                EventKind::KeyboardProgress { partial } => {
                    self.display
                        .submit(RenderRequest::UpdateUserInputEcho { text: partial });
                }

                EventKind::InputFinalized { text } => {
                    self.display.submit(RenderRequest::ShowLoadingPrompt);
                    self.display
                        .submit(RenderRequest::UpdateUserInputEcho { text });
                    // The submission is committed; charging counts from
                    // here.
                    self.dial.arm();
                }

                EventKind::ChargeProgress { unit } => {
                    self.display
                        .submit(RenderRequest::AdvanceLoadingBar { unit });
                }

                EventKind::ChargeComplete => {
                    self.charge_complete = true;
                    self.check_show_response();
                }

                EventKind::ModelResponse { reply } => {
                    self.pending_reply = Some(reply);
                    self.check_show_response();
                }
            }
        }

        self.shutdown();
    }

    /// The both-conditions gate: show the reply only when the charge is
    /// full *and* a reply is pending, then clear both slots together.
    fn check_show_response(&mut self) {
        if !self.charge_complete {
            return;
        }
        let Some(reply) = self.pending_reply.take() else {
            return;
        };

        tracing::info!("charge and reply both ready, showing response");
        self.display
            .submit(RenderRequest::ShowResponse { text: reply });
        self.charge_complete = false;
    }

    /// Stop all workers and discard whatever is still queued.
    fn shutdown(&mut self) {
        tracing::info!("shutting down device workers");

        self.dial.disarm();
        self.worker.stop();
        self.display.stop();

        let dropped = self.events.drain();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded queued events at shutdown");
        }

        tracing::info!("device controller stopped");
    }
}
