//! Simulated Crank
//!
//! Drives the dial without hardware: a thread that, whenever the dial is
//! armed, delivers one full revolution's worth of clockwise ticks per
//! interval. With the default ratios that is one charge unit every three
//! intervals and a full charge after eighteen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use treadle_core::{Dial, Direction};

/// Handle to the crank thread.
pub struct SimulatedCrank {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SimulatedCrank {
    /// Spawn the crank, turning `dial` one revolution (`ticks_per_rev`
    /// ticks) every `interval` while the dial is armed.
    pub fn spawn(dial: Arc<Dial>, ticks_per_rev: u32, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let join = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("treadle-crank".to_string())
                .spawn(move || {
                    tracing::info!("simulated crank running");
                    while !stop.load(Ordering::SeqCst) {
                        if dial.is_armed() {
                            for _ in 0..ticks_per_rev {
                                dial.tick(Direction::Clockwise);
                            }
                        }
                        std::thread::sleep(interval);
                    }
                })
                .expect("Failed to spawn crank thread")
        };

        Self {
            stop,
            join: Some(join),
        }
    }

    /// Stop the crank and wait for its thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("crank thread panicked");
            }
        }
    }
}
