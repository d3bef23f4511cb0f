// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, info, span, Level as LogLevel};

use crate::debounce::{Debouncer, Edge};
use crate::input::{Level, Source};
use crate::machine::Machine;

/// Errors that end the supervisor loop. Losing the inputs is the only one:
/// the controller cannot operate safely without them.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("error reading digital inputs: {0}")]
    Input(#[from] io::Error),
}

/// Timing and pin assignments for the control loop.
pub struct Settings {
    /// The pin wired to the playback trigger button.
    pub trigger_pin: u8,
    /// The pin wired to the shutdown button.
    pub shutdown_pin: u8,
    /// How long a level must hold to count as a clean edge.
    pub debounce: Duration,
    /// How long the shutdown input must stay asserted before commit.
    pub confirm_window: Duration,
    /// The control loop period.
    pub poll_period: Duration,
    /// How often to reconcile process liveness against expected state.
    pub reconcile_period: Duration,
}

/// Runs the control loop on a single blocking thread: poll both inputs,
/// debounce, feed edges to the state machine, and periodically reconcile
/// real process liveness. All state transitions are serialized through this
/// one thread, so the machine needs no locks.
pub struct Supervisor {
    handle: JoinHandle<Result<(), SupervisorError>>,
    interrupted: Arc<AtomicBool>,
}

impl Supervisor {
    /// Creates a supervisor and starts the control loop. An interactive
    /// interrupt tears down all rendering processes and ends the loop
    /// cleanly.
    pub fn new(machine: Machine, source: Arc<dyn Source>, settings: Settings) -> Supervisor {
        let interrupted = Arc::new(AtomicBool::new(false));

        {
            let interrupted = Arc::clone(&interrupted);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(err = e.to_string(), "Error waiting for interrupt signal.");
                    return;
                }
                interrupted.store(true, Ordering::Relaxed);
            });
        }

        let handle = {
            let interrupted = Arc::clone(&interrupted);
            tokio::task::spawn_blocking(move || {
                Loop::new(machine, source, settings, interrupted).run()
            })
        };

        Supervisor {
            handle,
            interrupted,
        }
    }

    /// Requests the same teardown as an interactive interrupt.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    /// Blocks until the control loop finishes.
    pub async fn join(&mut self) -> Result<(), Box<dyn Error>> {
        (&mut self.handle).await??;
        Ok(())
    }
}

/// The control loop state. Kept separate from Supervisor so tests can drive
/// individual steps with synthetic clocks.
struct Loop {
    machine: Machine,
    source: Arc<dyn Source>,
    settings: Settings,
    trigger: Debouncer,
    shutdown: Debouncer,
    /// When a shutdown edge was seen and is awaiting confirmation.
    pending_shutdown: Option<Instant>,
    last_reconcile: Option<Instant>,
    interrupted: Arc<AtomicBool>,
}

impl Loop {
    fn new(
        machine: Machine,
        source: Arc<dyn Source>,
        settings: Settings,
        interrupted: Arc<AtomicBool>,
    ) -> Loop {
        let trigger = Debouncer::new(Level::Released, settings.debounce);
        let shutdown = Debouncer::new(Level::Released, settings.debounce);
        Loop {
            machine,
            source,
            settings,
            trigger,
            shutdown,
            pending_shutdown: None,
            last_reconcile: None,
            interrupted,
        }
    }

    fn run(mut self) -> Result<(), SupervisorError> {
        let span = span!(LogLevel::INFO, "supervisor");
        let _enter = span.enter();

        self.machine.startup(Instant::now());
        info!(
            poll_ms = self.settings.poll_period.as_millis() as u64,
            "Supervisor started."
        );

        loop {
            if self.interrupted.load(Ordering::Relaxed) {
                info!("Interrupt received, tearing down.");
                self.machine.teardown();
                self.source.release();
                return Ok(());
            }

            if let Err(e) = self.step(Instant::now()) {
                error!(err = e.to_string(), "Fatal supervisor error, tearing down.");
                self.machine.teardown();
                self.source.release();
                return Err(e);
            }

            thread::sleep(self.settings.poll_period);
        }
    }

    /// One tick of the control loop. Completions run before new edges so a
    /// session ending and a trigger arriving on the same tick resolve to
    /// Idle first; the trigger is then accepted rather than dropped.
    fn step(&mut self, now: Instant) -> Result<(), SupervisorError> {
        self.machine.tick(now);

        if self
            .last_reconcile
            .map_or(true, |last| now.duration_since(last) >= self.settings.reconcile_period)
        {
            self.machine.reconcile(now);
            self.last_reconcile = Some(now);
        }

        let trigger_level = self.source.read(self.settings.trigger_pin)?;
        let shutdown_level = self.source.read(self.settings.shutdown_pin)?;

        if let Some(Edge::Asserted) = self.trigger.observe(trigger_level, now) {
            self.machine.on_trigger(now);
        }

        match self.shutdown.observe(shutdown_level, now) {
            Some(Edge::Asserted) => {
                info!(
                    confirm_ms = self.settings.confirm_window.as_millis() as u64,
                    "Shutdown requested, awaiting confirmation."
                );
                self.pending_shutdown = Some(now);
            }
            Some(Edge::Released) => {
                if self.pending_shutdown.take().is_some() {
                    info!("Shutdown input released before confirmation.");
                }
            }
            None => {}
        }

        if let Some(requested_at) = self.pending_shutdown {
            if now.duration_since(requested_at) >= self.settings.confirm_window {
                self.pending_shutdown = None;
                // Re-sample the raw level: the commit must reflect the input
                // as it is now, not the debounced history.
                if self.source.read(self.settings.shutdown_pin)? == Level::Asserted {
                    self.machine.on_shutdown_confirmed(now);
                } else {
                    info!("Shutdown not confirmed, input no longer asserted.");
                }
            }
        }

        Ok(())
    }
}
