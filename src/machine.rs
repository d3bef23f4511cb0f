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
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, span, warn, Level, Span};

use crate::catalog::{Catalog, Segment};
use crate::power::PowerOff;
use crate::render::{Handle, Renderer};

/// What the controller is doing right now. ShuttingDown is terminal: no
/// further input is processed once it is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Playing,
    ShuttingDown,
}

/// Why a playback session ended.
#[derive(Debug, Clone, Copy)]
pub enum Completion {
    /// The play duration elapsed.
    Deadline,
    /// Reconciliation found the rendering process gone.
    ProcessExit,
}

/// One in-flight playback of a segment. Owned exclusively by the machine and
/// destroyed when playback ends or shutdown preempts it.
struct Session {
    /// The segment being played.
    segment: Arc<Segment>,
    /// When playback started.
    started_at: Instant,
    /// When playback is due to complete.
    deadline: Instant,
    /// The rendering process.
    handle: Box<dyn Handle>,
}

/// The playback state machine. All transitions are driven by the supervisor
/// loop on a single thread; methods take the current time explicitly so the
/// machine never reads the clock itself and tests can drive simulated time.
///
/// The machine is the sole authority over the display and audio output: at
/// most one of the idle handle and the session handle is alive in steady
/// state, with a bounded overlap during handoff.
pub struct Machine {
    /// The segment catalog.
    catalog: Arc<Catalog>,
    /// Launches rendering processes.
    renderer: Arc<dyn Renderer>,
    /// The host power-off action.
    power: Arc<dyn PowerOff>,
    /// The current mode.
    mode: Mode,
    /// The active playback session. Non-empty iff mode is Playing.
    session: Option<Session>,
    /// The idle visual, if one is running.
    idle: Option<Box<dyn Handle>>,
    /// Set once the renderer reports that no idle content is configured.
    idle_absent: bool,
    /// Earliest time another idle launch may be attempted after a failure.
    idle_backoff_until: Option<Instant>,
    /// How long to wait for a process to stop gracefully.
    stop_timeout: Duration,
    /// Minimum gap between consecutive idle launch attempts.
    idle_retry: Duration,
    /// The logging span.
    span: Span,
}

impl Machine {
    /// Creates a new machine in Idle with no processes running.
    pub fn new(
        catalog: Arc<Catalog>,
        renderer: Arc<dyn Renderer>,
        power: Arc<dyn PowerOff>,
        stop_timeout: Duration,
        idle_retry: Duration,
    ) -> Machine {
        Machine {
            catalog,
            renderer,
            power,
            mode: Mode::Idle,
            session: None,
            idle: None,
            idle_absent: false,
            idle_backoff_until: None,
            stop_timeout,
            idle_retry,
            span: span!(Level::INFO, "machine"),
        }
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The active session's segment name and start time, if playing.
    pub fn session(&self) -> Option<(&str, Instant)> {
        self.session
            .as_ref()
            .map(|session| (session.segment.name.as_str(), session.started_at))
    }

    /// Plays the startup chime and brings up the idle visual. Neither is
    /// required for the machine to operate; failures are logged and the
    /// machine starts degraded.
    pub fn startup(&mut self, now: Instant) {
        let _enter = self.span.clone().entered();

        match self.renderer.start_chime() {
            // The chime plays and exits on its own; nothing to hold on to.
            Ok(Some(_)) => info!("Startup chime playing."),
            Ok(None) => {}
            Err(e) => warn!(err = e.to_string(), "Unable to play startup chime."),
        }

        self.ensure_idle(now);
    }

    /// A debounced trigger press. In Idle this selects a segment and starts
    /// playback; while already playing it is deliberately ignored rather
    /// than queued, interrupted, or restarted.
    pub fn on_trigger(&mut self, now: Instant) {
        let _enter = self.span.clone().entered();

        match self.mode {
            Mode::ShuttingDown => return,
            Mode::Playing => {
                info!(
                    segment = self
                        .session
                        .as_ref()
                        .map(|s| s.segment.name.as_str())
                        .unwrap_or_default(),
                    "Already playing a segment, ignoring trigger."
                );
                return;
            }
            Mode::Idle => {}
        }

        let segment = match self.catalog.pick() {
            Some(segment) => segment,
            None => {
                warn!("Trigger ignored, the segment catalog is empty.");
                return;
            }
        };

        // Start the new content before stopping the idle visual so the
        // display never goes blank during handoff. The overlap is bounded by
        // the renderer's launch verification plus one stop timeout.
        let handle = match self.renderer.start_segment(&segment) {
            Ok(handle) => handle,
            Err(e) => {
                error!(
                    segment = segment.name,
                    err = e.to_string(),
                    "Unable to start segment, staying idle."
                );
                return;
            }
        };
        self.stop_idle();

        info!(
            segment = segment.name,
            duration = segment.duration.as_secs_f64(),
            "Starting playback."
        );
        self.session = Some(Session {
            deadline: now + segment.duration,
            started_at: now,
            segment,
            handle,
        });
        self.mode = Mode::Playing;
    }

    /// Ends the active session and returns to Idle, restoring the idle
    /// visual. No-op outside Playing.
    pub fn on_completion(&mut self, now: Instant, reason: Completion) {
        let _enter = self.span.clone().entered();

        let session = match self.session.take() {
            Some(session) => session,
            None => return,
        };

        if let Err(e) = session.handle.stop(self.stop_timeout) {
            error!(err = e.to_string(), "Error stopping segment process.");
        }
        info!(
            segment = session.segment.name,
            reason = format!("{:?}", reason),
            "Playback finished."
        );

        self.mode = Mode::Idle;
        self.ensure_idle(now);
    }

    /// Advances time-based state: completes a session whose deadline has
    /// passed and re-attempts the idle visual when due. Run every supervisor
    /// tick, before any new edges are fed in, so a completion and a trigger
    /// landing on the same tick resolve in that order.
    pub fn tick(&mut self, now: Instant) {
        match self.mode {
            Mode::Playing => {
                if self
                    .session
                    .as_ref()
                    .is_some_and(|session| now >= session.deadline)
                {
                    self.on_completion(now, Completion::Deadline);
                }
            }
            Mode::Idle => self.ensure_idle(now),
            Mode::ShuttingDown => {}
        }
    }

    /// Compares real process liveness against expected state. A dead session
    /// process is a completion; a dead idle process is relaunched no sooner
    /// than the retry interval.
    pub fn reconcile(&mut self, now: Instant) {
        let _enter = self.span.clone().entered();

        match self.mode {
            Mode::Playing => {
                if self
                    .session
                    .as_ref()
                    .is_some_and(|session| !session.handle.is_alive())
                {
                    self.on_completion(now, Completion::ProcessExit);
                }
            }
            Mode::Idle => {
                if self.idle.as_ref().is_some_and(|idle| !idle.is_alive()) {
                    warn!("Idle visual exited unexpectedly.");
                    self.idle = None;
                    self.idle_backoff_until = Some(now + self.idle_retry);
                }
            }
            Mode::ShuttingDown => {}
        }
    }

    /// Commits shutdown: tears down any in-flight playback synchronously,
    /// invokes the power-off action exactly once, and leaves the machine
    /// terminal. A failed power-off is logged and the machine halts here
    /// rather than retrying a destructive host action.
    pub fn on_shutdown_confirmed(&mut self, _now: Instant) {
        let _enter = self.span.clone().entered();

        if self.mode == Mode::ShuttingDown {
            return;
        }

        info!("Shutdown confirmed, stopping playback.");
        self.stop_all();
        self.mode = Mode::ShuttingDown;

        if let Err(e) = self.power.power_off() {
            error!(err = e.to_string(), "Power-off action failed, halting.");
        }
    }

    /// Stops every rendering process. Used on the interrupt path and on
    /// fatal errors; the machine itself stays in its current mode.
    pub fn teardown(&mut self) {
        let _enter = self.span.clone().entered();

        info!("Tearing down rendering processes.");
        self.stop_all();
    }

    fn stop_all(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.handle.stop(self.stop_timeout) {
                error!(err = e.to_string(), "Error stopping segment process.");
            }
        }
        self.stop_idle();
    }

    fn stop_idle(&mut self) {
        if let Some(idle) = self.idle.take() {
            if let Err(e) = idle.stop(self.stop_timeout) {
                error!(err = e.to_string(), "Error stopping idle visual.");
            }
        }
    }

    /// Brings up the idle visual if it should be running and is not. Launch
    /// failures back off rather than retrying every tick against a broken
    /// dependency.
    fn ensure_idle(&mut self, now: Instant) {
        if self.idle_absent || self.idle.is_some() {
            return;
        }
        if self
            .idle_backoff_until
            .is_some_and(|until| now < until)
        {
            return;
        }

        match self.renderer.start_idle() {
            Ok(Some(handle)) => {
                self.idle = Some(handle);
                self.idle_backoff_until = None;
            }
            Ok(None) => {
                info!("No idle content configured, idling with a blank display.");
                self.idle_absent = true;
            }
            Err(e) => {
                error!(err = e.to_string(), "Unable to start idle visual.");
                self.idle_backoff_until = Some(now + self.idle_retry);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crate::catalog::{Catalog, Segment};
    use crate::power;
    use crate::render::mock;

    use super::{Completion, Machine, Mode};

    const STOP_TIMEOUT: Duration = Duration::from_secs(1);
    const IDLE_RETRY: Duration = Duration::from_secs(5);

    fn catalog(names: &[&str]) -> Arc<Catalog> {
        let segments = names
            .iter()
            .enumerate()
            .map(|(i, name)| Segment {
                name: name.to_string(),
                start: Duration::from_secs(10 * i as u64),
                duration: Duration::from_secs(2),
            })
            .collect();
        Arc::new(Catalog::new(segments).expect("catalog"))
    }

    fn machine(catalog: Arc<Catalog>) -> (Machine, mock::Renderer, power::mock::PowerOff) {
        let renderer = mock::Renderer::new();
        let power = power::mock::PowerOff::new();
        let machine = Machine::new(
            catalog,
            Arc::new(renderer.clone()),
            Arc::new(power.clone()),
            STOP_TIMEOUT,
            IDLE_RETRY,
        );
        (machine, renderer, power)
    }

    #[test]
    fn test_startup_brings_up_chime_and_idle() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        assert_eq!(vec!["chime", "idle"], renderer.started());
        assert_eq!(vec!["idle"], renderer.foreground());
        assert_eq!(Mode::Idle, machine.mode());
    }

    #[test]
    fn test_trigger_starts_playback_and_takes_foreground() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        machine.on_trigger(now);

        assert_eq!(Mode::Playing, machine.mode());
        assert_eq!(vec!["segment:a"], renderer.foreground());
        let (name, started_at) = machine.session().expect("session");
        assert_eq!("a", name);
        assert_eq!(now, started_at);
    }

    #[test]
    fn test_single_flight_playback() {
        let (mut machine, _, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.on_trigger(now);
        let (name, started_at) = machine.session().expect("session");
        let name = name.to_string();

        // Any number of further triggers leave the session untouched.
        for i in 1..10 {
            machine.on_trigger(now + Duration::from_millis(i * 50));
            let (current_name, current_started_at) = machine.session().expect("session");
            assert_eq!(name, current_name);
            assert_eq!(started_at, current_started_at);
        }
    }

    #[test]
    fn test_completion_at_exactly_the_play_duration() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.on_trigger(now);
        assert_eq!(Mode::Playing, machine.mode());

        // One tick shy of the deadline, still playing.
        machine.tick(now + Duration::from_secs(2) - Duration::from_millis(1));
        assert_eq!(Mode::Playing, machine.mode());

        machine.tick(now + Duration::from_secs(2));
        assert_eq!(Mode::Idle, machine.mode());
        assert!(machine.session().is_none());
        // The idle visual is restored after playback.
        assert_eq!(vec!["idle"], renderer.foreground());
    }

    #[test]
    fn test_reconcile_treats_process_death_as_completion() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.on_trigger(now);
        renderer.exit("segment:a");

        machine.reconcile(now + Duration::from_millis(500));
        assert_eq!(Mode::Idle, machine.mode());
        assert!(machine.session().is_none());
    }

    #[test]
    fn test_completion_before_trigger_in_the_same_tick() {
        let (mut machine, _, _) = machine(catalog(&["a", "b", "c"]));
        let now = Instant::now();

        machine.on_trigger(now);
        let deadline = now + Duration::from_secs(2);

        // Supervisor ordering: tick (completion) first, then the edge. The
        // trigger lands against Idle and starts a fresh session.
        machine.tick(deadline);
        assert_eq!(Mode::Idle, machine.mode());
        machine.on_trigger(deadline);
        assert_eq!(Mode::Playing, machine.mode());
        let (_, started_at) = machine.session().expect("session");
        assert_eq!(deadline, started_at);
    }

    #[test]
    fn test_segment_launch_failure_stays_idle() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        renderer.set_fail_segments(true);
        machine.on_trigger(now);

        assert_eq!(Mode::Idle, machine.mode());
        assert!(machine.session().is_none());
        // The idle visual was never torn down.
        assert_eq!(vec!["idle"], renderer.foreground());
    }

    #[test]
    fn test_idle_failure_is_degraded_not_fatal() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        renderer.set_fail_idle(true);
        machine.startup(now);
        assert_eq!(Mode::Idle, machine.mode());
        assert!(renderer.foreground().is_empty());

        // Playback still works without an idle visual.
        machine.on_trigger(now);
        assert_eq!(Mode::Playing, machine.mode());
    }

    #[test]
    fn test_idle_relaunch_is_rate_limited() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        renderer.set_fail_idle(true);
        machine.startup(now);
        assert_eq!(1, renderer.idle_attempts());

        // Ticks inside the retry interval do not re-attempt.
        for i in 1..20 {
            machine.tick(now + Duration::from_millis(i * 100));
        }
        assert_eq!(1, renderer.idle_attempts());

        // Past the interval, one more attempt is made.
        machine.tick(now + IDLE_RETRY);
        assert_eq!(2, renderer.idle_attempts());
    }

    #[test]
    fn test_unexpected_idle_exit_backs_off_before_relaunch() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        renderer.exit("idle");

        machine.reconcile(now + Duration::from_secs(1));
        machine.tick(now + Duration::from_secs(1));
        assert!(renderer.foreground().is_empty());

        machine.tick(now + Duration::from_secs(1) + IDLE_RETRY);
        assert_eq!(vec!["idle"], renderer.foreground());
    }

    #[test]
    fn test_no_idle_content_stops_retrying() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        renderer.set_no_idle(true);
        machine.startup(now);

        machine.tick(now + IDLE_RETRY * 10);
        assert_eq!(0, renderer.idle_attempts());
    }

    #[test]
    fn test_shutdown_commit_is_terminal_and_exact_once() {
        let (mut machine, renderer, power) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        machine.on_trigger(now);
        machine.on_shutdown_confirmed(now + Duration::from_secs(1));

        assert_eq!(Mode::ShuttingDown, machine.mode());
        assert!(machine.session().is_none());
        assert!(renderer.foreground().is_empty());
        assert_eq!(1, power.invocations());

        // Held input produces repeated confirmations; the commit stays
        // idempotent and further triggers are dead.
        machine.on_shutdown_confirmed(now + Duration::from_secs(2));
        machine.on_trigger(now + Duration::from_secs(3));
        machine.tick(now + Duration::from_secs(4));
        assert_eq!(1, power.invocations());
        assert_eq!(Mode::ShuttingDown, machine.mode());
    }

    #[test]
    fn test_power_off_failure_halts_without_retry() {
        let (mut machine, _, power) = machine(catalog(&["a"]));
        let now = Instant::now();

        power.set_fail(true);
        machine.on_shutdown_confirmed(now);

        assert_eq!(Mode::ShuttingDown, machine.mode());
        assert_eq!(1, power.invocations());

        machine.on_shutdown_confirmed(now + Duration::from_secs(1));
        assert_eq!(1, power.invocations());
    }

    #[test]
    fn test_foreground_exclusivity_across_many_cycles() {
        let (mut machine, renderer, _) = machine(catalog(&["a", "b", "c"]));
        let mut now = Instant::now();

        machine.startup(now);
        for _ in 0..50 {
            machine.on_trigger(now);
            assert_eq!(1, renderer.foreground().len());
            now += Duration::from_secs(2);
            machine.tick(now);
            assert_eq!(vec!["idle"], renderer.foreground());
        }

        // Handoff overlap never exceeded the new process plus the one being
        // replaced.
        assert!(renderer.max_foreground() <= 2);
    }

    #[test]
    fn test_teardown_stops_everything() {
        let (mut machine, renderer, power) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.startup(now);
        machine.on_trigger(now);
        machine.teardown();

        assert!(renderer.foreground().is_empty());
        assert_eq!(0, power.invocations());
    }

    #[test]
    fn test_empty_catalog_ignores_triggers() {
        let (mut machine, renderer, _) = machine(Arc::new(Catalog::empty()));
        let now = Instant::now();

        machine.startup(now);
        machine.on_trigger(now);
        assert_eq!(Mode::Idle, machine.mode());
        assert_eq!(vec!["idle"], renderer.foreground());
    }

    #[test]
    fn test_completion_reason_process_exit() {
        let (mut machine, renderer, _) = machine(catalog(&["a"]));
        let now = Instant::now();

        machine.on_trigger(now);
        renderer.exit("segment:a");
        machine.on_completion(now + Duration::from_secs(1), Completion::ProcessExit);
        assert_eq!(Mode::Idle, machine.mode());
    }
}
