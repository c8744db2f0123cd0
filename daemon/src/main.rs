//! Treadle Daemon - Terminal Wiring for the Conversation Device
//!
//! Entry point for running the treadle coordination core from a terminal:
//! raw-mode stdin stands in for the device keyboard, stdout for the
//! e-paper panel, and (optionally) a simulated crank for the rotary dial.
//! On the real device, the same core is wired to the hardware keyboard
//! scanner, the panel driver, and the encoder's tick callback instead.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (Ollama on localhost, simulated crank off)
//! treadle-daemon
//!
//! # Drive the dial automatically
//! treadle-daemon --simulate-crank
//!
//! # Custom model and config file
//! treadle-daemon --model llama3.2:3b --config ./treadle.toml
//!
//! # Verbose logging
//! RUST_LOG=debug treadle-daemon
//! ```
//!
//! # Signals
//!
//! `SIGTERM` / `SIGINT`: graceful shutdown; every worker stops within one
//! polling interval (plus any in-flight model call).

mod sim;
mod term;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{info, warn};

use treadle_core::{
    load_config, load_config_from_path, Controller, Event, EventKind, LanguageModel, OllamaBackend,
};

use sim::SimulatedCrank;
use term::{ConsoleRenderer, RawModeGuard, TerminalKeys};

/// Treadle daemon - hand-cranked conversation device, terminal edition
#[derive(Parser, Debug)]
#[command(name = "treadle-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "TREADLE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model to request from the backend (overrides config)
    #[arg(short = 'm', long, env = "TREADLE_MODEL")]
    model: Option<String>,

    /// Backend host (overrides config)
    #[arg(long, env = "TREADLE_OLLAMA_HOST")]
    host: Option<String>,

    /// Backend port (overrides config)
    #[arg(long, env = "TREADLE_OLLAMA_PORT")]
    port: Option<u16>,

    /// Transcript journal path (overrides config)
    #[arg(long, env = "TREADLE_TRANSCRIPT", value_name = "PATH")]
    transcript: Option<PathBuf>,

    /// Crank the dial automatically instead of waiting for hardware ticks
    #[arg(long)]
    simulate_crank: bool,

    /// Simulated crank speed: one full revolution per this many
    /// milliseconds
    #[arg(long, default_value = "250", value_name = "MS")]
    crank_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "TREADLE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Set by the signal handler; a watcher thread turns it into a Shutdown
/// event. Nothing else is safe to do inside a signal handler.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Install SIGINT/SIGTERM handlers that raise the shutdown flag.
fn install_signal_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_shutdown_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );

    // Safety: the handler only stores to an atomic.
    unsafe {
        sigaction(Signal::SIGINT, &action).context("failed to install SIGINT handler")?;
        sigaction(Signal::SIGTERM, &action).context("failed to install SIGTERM handler")?;
    }
    Ok(())
}

/// Initialize logging with the specified level.
///
/// Logs go to stderr so the panel output on stdout stays readable.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("treadle_daemon={level},treadle_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Treadle daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    // Config file, then env, then CLI overrides.
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };
    if let Some(model) = args.model {
        config.model.model = model;
    }
    if let Some(host) = args.host {
        config.model.host = host;
    }
    if let Some(port) = args.port {
        config.model.port = port;
    }
    if let Some(path) = args.transcript {
        config.transcript.path = path;
    }

    info!(model = %config.model.model, "using model");
    info!(path = %config.transcript.path.display(), "transcript journal");

    let backend = Arc::new(OllamaBackend::from_settings(&config.model));
    if !backend.health_check() {
        warn!(
            host = %config.model.host,
            port = config.model.port,
            "backend not reachable - first exchange may fail"
        );
    }

    install_signal_handlers()?;

    // Terminal collaborators. The raw-mode guard restores the terminal on
    // exit.
    let _raw_mode = RawModeGuard::new().context("failed to enter raw terminal mode")?;
    let keys = TerminalKeys::new();
    let renderer = ConsoleRenderer::new("William Morris", config.dial.max_units);

    let mut controller = Controller::new(&config, backend, Box::new(renderer), Box::new(keys));

    // The signal handler may only touch an atomic; this watcher folds the
    // flag into the event stream the dispatch loop already consumes.
    let events = controller.events();
    let signal_watcher = std::thread::Builder::new()
        .name("treadle-signals".to_string())
        .spawn(move || loop {
            if SHUTDOWN.load(Ordering::SeqCst) {
                info!("shutdown signal received");
                events.push(Event::new(EventKind::Shutdown));
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        })
        .context("failed to spawn signal watcher")?;

    let mut crank = args.simulate_crank.then(|| {
        SimulatedCrank::spawn(
            controller.dial(),
            config.dial.ticks_per_rev,
            Duration::from_millis(args.crank_interval_ms),
        )
    });

    println!("Type your prompt and press enter; then crank the wheel.");
    controller.run();

    // Orderly teardown of the daemon-side helpers.
    if let Some(crank) = crank.as_mut() {
        crank.stop();
    }
    SHUTDOWN.store(true, Ordering::SeqCst);
    if signal_watcher.join().is_err() {
        warn!("signal watcher thread panicked");
    }

    info!("Treadle daemon stopped cleanly");
    Ok(())
}
