//! Terminal Collaborators
//!
//! Stand-ins for the device's physical keyboard and e-paper panel, so the
//! coordination core can be driven from any terminal: a raw-mode stdin
//! [`KeySource`] and a stdout [`Renderer`]. On the real device these seams
//! are filled by the hardware keyboard scanner and the panel driver.

use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use parking_lot::Mutex;

use treadle_core::{Key, KeySink, KeySource, RenderError, RenderRequest, Renderer};

/// Puts stdin into raw-ish mode for the process lifetime and restores the
/// original settings on drop.
///
/// Only canonical mode and echo are disabled; ISIG stays on so Ctrl-C
/// still raises SIGINT and flows through the normal shutdown path.
pub struct RawModeGuard {
    original: Termios,
}

impl RawModeGuard {
    /// Switch stdin to raw-ish mode.
    pub fn new() -> Result<Self> {
        let stdin = std::io::stdin();
        let original =
            termios::tcgetattr(stdin.as_fd()).context("failed to read terminal attributes")?;

        let mut raw = original.clone();
        raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO);
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)
            .context("failed to set raw terminal mode")?;

        Ok(Self { original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.original) {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

struct KeyGate {
    sink: Mutex<Option<Arc<dyn KeySink>>>,
    open: AtomicBool,
}

/// Key source reading raw bytes from stdin.
///
/// A single reader thread lives for the process lifetime; `start`/`stop`
/// open and close a gate in front of it, and bytes arriving while the gate
/// is closed are discarded (matching the hardware scanner, which only
/// delivers while capture is active). The thread is deliberately not
/// joined - it blocks in `read` and dies with the process.
pub struct TerminalKeys {
    gate: Arc<KeyGate>,
}

impl TerminalKeys {
    /// Create the key source and spawn its reader thread.
    pub fn new() -> Self {
        let gate = Arc::new(KeyGate {
            sink: Mutex::new(None),
            open: AtomicBool::new(false),
        });

        {
            let gate = Arc::clone(&gate);
            std::thread::Builder::new()
                .name("treadle-keys".to_string())
                .spawn(move || read_loop(&gate))
                .expect("Failed to spawn stdin reader thread");
        }

        Self { gate }
    }
}

impl Default for TerminalKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for TerminalKeys {
    fn start(&mut self, sink: Arc<dyn KeySink>) {
        *self.gate.sink.lock() = Some(sink);
        self.gate.open.store(true, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.gate.open.store(false, Ordering::SeqCst);
        *self.gate.sink.lock() = None;
    }
}

fn read_loop(gate: &KeyGate) {
    let mut stdin = std::io::stdin().lock();
    let mut byte = [0u8; 1];

    loop {
        match stdin.read(&mut byte) {
            Ok(0) => {
                tracing::debug!("stdin closed, key reader exiting");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, key reader exiting");
                return;
            }
        }

        if !gate.open.load(Ordering::SeqCst) {
            continue;
        }

        let key = match byte[0] {
            b'\r' | b'\n' => Key::Enter,
            0x7f | 0x08 => Key::Backspace,
            b' ' => Key::Space,
            // Printable ASCII only; scan-code mapping beyond that is the
            // hardware keyboard's concern.
            c if (0x21..=0x7e).contains(&c) => Key::Char(char::from(c)),
            _ => continue,
        };

        let sink = gate.sink.lock().clone();
        if let Some(sink) = sink {
            sink.key(key);
        }
    }
}

/// Renderer writing the panel's content to stdout.
pub struct ConsoleRenderer {
    persona: String,
    max_units: u8,
}

impl ConsoleRenderer {
    /// Create a renderer labelling replies with `persona` and drawing a
    /// charge bar of `max_units` segments.
    pub fn new(persona: impl Into<String>, max_units: u8) -> Self {
        Self {
            persona: persona.into(),
            max_units,
        }
    }
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
        let mut out = std::io::stdout().lock();
        match request {
            RenderRequest::ShowLoadingPrompt => {
                writeln!(
                    out,
                    "\n{}: The machine before you is wholly self-contained. Set the wheel \
                     in motion, and by your own hand provide the power required to \
                     generate a response!",
                    self.persona
                )?;
            }
            RenderRequest::UpdateUserInputEcho { text } => {
                writeln!(out, "You: {text}")?;
            }
            RenderRequest::AdvanceLoadingBar { unit } => {
                let filled = usize::from(*unit) + 1;
                let empty = usize::from(self.max_units).saturating_sub(filled);
                writeln!(out, "[{}{}]", "#".repeat(filled), "-".repeat(empty))?;
            }
            RenderRequest::ShowResponse { text } => {
                writeln!(out, "\n{}: {text}\n", self.persona)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}
