// SPDX-License-Identifier: GPL-3.0-only

//! Periodic driver for [`DetectionStabilizer::tick`]
//!
//! The tick task runs on its own named thread and sleeps on a stop channel
//! between ticks, so `stop()` wakes it immediately instead of waiting out
//! the period. `stop()` joins the thread: once it returns no tick is running
//! and none will start.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::window::DetectionStabilizer;

/// What a single tick produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub now_ms: u64,
    pub stable: Option<String>,
    /// Stable value differs from the previous tick's
    pub changed: bool,
}

struct TickTask {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs stabilizer ticks at a fixed period on a background thread
pub struct StabilizerScheduler {
    stabilizer: Arc<DetectionStabilizer>,
    clock: Arc<dyn Clock>,
    task: Option<TickTask>,
}

impl StabilizerScheduler {
    pub fn new(stabilizer: Arc<DetectionStabilizer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            stabilizer,
            clock,
            task: None,
        }
    }

    pub fn stabilizer(&self) -> &Arc<DetectionStabilizer> {
        &self.stabilizer
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Start ticking every `period` with no tick callback
    pub fn start(&mut self, period: Duration) -> io::Result<()> {
        self.start_with(period, |_| {})
    }

    /// Start ticking every `period`, reporting each tick to `on_tick`
    ///
    /// A task that is already running is stopped first. The first tick
    /// happens one period after the call.
    pub fn start_with<F>(&mut self, period: Duration, mut on_tick: F) -> io::Result<()>
    where
        F: FnMut(TickOutcome) + Send + 'static,
    {
        if period.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tick period must be greater than zero",
            ));
        }
        self.stop();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let stabilizer = Arc::clone(&self.stabilizer);
        let clock = Arc::clone(&self.clock);

        let handle = thread::Builder::new()
            .name("stabilizer-tick".into())
            .spawn(move || {
                let mut previous = stabilizer.stable_value();
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let now_ms = clock.now_ms();
                    let stable = stabilizer.tick(now_ms);
                    let changed = stable != previous;
                    previous = stable.clone();
                    on_tick(TickOutcome {
                        now_ms,
                        stable,
                        changed,
                    });
                }
                debug!("Stabilizer tick thread exiting");
            })?;

        info!(period_ms = period.as_millis() as u64, "Stabilizer scheduler started");
        self.task = Some(TickTask { stop_tx, handle });
        Ok(())
    }

    /// Stop ticking and wait for the tick thread to finish
    ///
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // The thread may already be gone if a callback panicked
        let _ = task.stop_tx.send(());
        if task.handle.join().is_err() {
            warn!("Stabilizer tick thread panicked");
        }
        info!("Stabilizer scheduler stopped");
    }
}

impl Drop for StabilizerScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
