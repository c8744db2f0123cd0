//! Treadle Core - Coordination for a Hand-Cranked Conversation Device
//!
//! This crate is the coordination core of treadle: a physical device where
//! a rotating dial charges the machine, a keyboard supplies a prompt, a
//! local language model answers in a configured persona, and a slow
//! e-paper panel shows progress and text. The crate arbitrates between
//! those independently-running parts; it contains no pixel rendering, no
//! pulse counting, and no inference - those are collaborators behind
//! traits.
//!
//! # Architecture
//!
//! ```text
//!  keyboard ──▶ LineCapture ──┐                  ┌──▶ DisplayWorker ──▶ Renderer
//!                             │                  │      (private queue)
//!  sensor ────▶ Dial ─────────┼──▶ EventQueue ──▶ Controller
//!                             │                  │
//!  LanguageModel ◀── ModelWorker ────────────────┘
//!        (blocking complete)
//! ```
//!
//! Producers push typed [`Event`]s into one shared queue; the
//! [`Controller`] is the queue's only consumer and fans out
//! [`RenderRequest`]s to the display worker's private queue. A reply is
//! shown only when *both* the dial has reached full charge and the model
//! has finished generating - the two completions may arrive in either
//! order, and the single-threaded dispatch loop is what makes that gate
//! race-free.
//!
//! Each component runs on its own OS thread and is stopped cooperatively:
//! every blocking wait has a short timeout, and every loop re-checks its
//! stop flag on timeout, so shutdown is never more than one polling
//! interval away.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use treadle_core::{
//!     backend::OllamaBackend, config::load_config, controller::Controller,
//! };
//!
//! let config = load_config()?;
//! let backend = Arc::new(OllamaBackend::from_settings(&config.model));
//! let mut controller = Controller::new(
//!     &config,
//!     backend,
//!     Box::new(my_renderer),   // your display collaborator
//!     Box::new(my_keyboard),   // your key-capture collaborator
//! );
//!
//! // Wire the rotation sensor to the dial, then run the dispatch loop.
//! let dial = controller.dial();
//! controller.run();
//! ```
//!
//! # Module Overview
//!
//! - [`queue`]: the blocking FIFO shared by every producer
//! - [`events`]: the device event taxonomy
//! - [`render`]: render requests and the display seam
//! - [`dial`]: the charge-gesture input source
//! - [`capture`]: key events and the pending-line buffer
//! - [`conversation`]: the persona-prefixed transcript
//! - [`worker`]: the keyboard-to-reply model worker
//! - [`display`]: the render-pacing display worker
//! - [`controller`]: the dispatch loop and readiness gate
//! - [`backend`]: the language-model seam (Ollama shipped)
//! - [`transcript`]: the append-only exchange journal
//! - [`config`]: TOML/env configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod capture;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod dial;
pub mod display;
pub mod events;
pub mod queue;
pub mod render;
pub mod transcript;
pub mod worker;

// Re-exports for convenience
pub use backend::{BackendError, LanguageModel, OllamaBackend};
pub use capture::{Key, KeySink, KeySource, LineCapture};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, DeviceConfig,
    DEFAULT_SYSTEM_PROMPT,
};
pub use controller::Controller;
pub use conversation::{ChatMessage, ChatRole, Conversation};
pub use dial::{Dial, Direction};
pub use display::DisplayWorker;
pub use events::{Event, EventKind};
pub use queue::EventQueue;
pub use render::{RenderError, RenderRequest, Renderer};
pub use transcript::{ExchangeRecord, TranscriptJournal};
pub use worker::ModelWorker;
