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
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::Segment;
use crate::render::Error;

/// A mock renderer. Launches are recorded as labels ("idle", "chime",
/// "segment:<name>"), foreground occupancy is tracked so tests can assert
/// exclusivity, and failures can be injected per operation.
#[derive(Clone)]
pub struct Renderer {
    state: Arc<State>,
}

struct State {
    /// Labels of every launch, in order.
    started: Mutex<Vec<String>>,
    /// Labels of handles currently alive.
    foreground: Mutex<Vec<String>>,
    /// High-water mark of concurrently alive handles.
    max_foreground: AtomicUsize,
    /// The liveness flag of the most recent handle per label.
    handles: Mutex<HashMap<String, Arc<AtomicBool>>>,
    /// Idle launch attempts, including failed ones.
    idle_attempts: AtomicUsize,
    fail_idle: AtomicBool,
    fail_segments: AtomicBool,
    no_idle: AtomicBool,
}

impl Renderer {
    pub fn new() -> Renderer {
        Renderer {
            state: Arc::new(State {
                started: Mutex::new(Vec::new()),
                foreground: Mutex::new(Vec::new()),
                max_foreground: AtomicUsize::new(0),
                handles: Mutex::new(HashMap::new()),
                idle_attempts: AtomicUsize::new(0),
                fail_idle: AtomicBool::new(false),
                fail_segments: AtomicBool::new(false),
                no_idle: AtomicBool::new(false),
            }),
        }
    }

    fn launch(&self, label: String, takes_foreground: bool) -> Box<dyn super::Handle> {
        let alive = Arc::new(AtomicBool::new(true));
        self.state
            .started
            .lock()
            .expect("unable to get lock")
            .push(label.clone());
        self.state
            .handles
            .lock()
            .expect("unable to get lock")
            .insert(label.clone(), Arc::clone(&alive));

        // The chime is audio only; it never owns the display.
        if takes_foreground {
            let mut foreground = self.state.foreground.lock().expect("unable to get lock");
            foreground.push(label.clone());
            self.state
                .max_foreground
                .fetch_max(foreground.len(), Ordering::Relaxed);
        }

        Box::new(MockHandle {
            label,
            alive,
            state: Arc::clone(&self.state),
        })
    }

    /// Every launch so far, in order.
    pub fn started(&self) -> Vec<String> {
        self.state
            .started
            .lock()
            .expect("unable to get lock")
            .clone()
    }

    /// Labels of the handles currently alive.
    pub fn foreground(&self) -> Vec<String> {
        self.state
            .foreground
            .lock()
            .expect("unable to get lock")
            .clone()
    }

    /// The most handles that were ever alive at once.
    pub fn max_foreground(&self) -> usize {
        self.state.max_foreground.load(Ordering::Relaxed)
    }

    /// Idle launch attempts, including failed ones.
    pub fn idle_attempts(&self) -> usize {
        self.state.idle_attempts.load(Ordering::Relaxed)
    }

    /// Simulates the process behind the given label exiting on its own.
    pub fn exit(&self, label: &str) {
        if let Some(alive) = self
            .state
            .handles
            .lock()
            .expect("unable to get lock")
            .get(label)
        {
            alive.store(false, Ordering::Relaxed);
        }
        self.state
            .foreground
            .lock()
            .expect("unable to get lock")
            .retain(|l| l != label);
    }

    pub fn set_fail_idle(&self, fail: bool) {
        self.state.fail_idle.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_segments(&self, fail: bool) {
        self.state.fail_segments.store(fail, Ordering::Relaxed);
    }

    /// Makes start_idle report that no idle content is configured.
    pub fn set_no_idle(&self, no_idle: bool) {
        self.state.no_idle.store(no_idle, Ordering::Relaxed);
    }

    fn launch_error(&self) -> Error {
        Error::Launch {
            program: "mock".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Renderer for Renderer {
    fn start_idle(&self) -> Result<Option<Box<dyn super::Handle>>, Error> {
        if self.state.no_idle.load(Ordering::Relaxed) {
            return Ok(None);
        }
        self.state.idle_attempts.fetch_add(1, Ordering::Relaxed);
        if self.state.fail_idle.load(Ordering::Relaxed) {
            return Err(self.launch_error());
        }
        Ok(Some(self.launch("idle".to_string(), true)))
    }

    fn start_segment(&self, segment: &Segment) -> Result<Box<dyn super::Handle>, Error> {
        if self.state.fail_segments.load(Ordering::Relaxed) {
            return Err(self.launch_error());
        }
        Ok(self.launch(format!("segment:{}", segment.name), true))
    }

    fn start_chime(&self) -> Result<Option<Box<dyn super::Handle>>, Error> {
        Ok(Some(self.launch("chime".to_string(), false)))
    }
}

/// A handle on one mock launch.
struct MockHandle {
    label: String,
    alive: Arc<AtomicBool>,
    state: Arc<State>,
}

impl super::Handle for MockHandle {
    fn stop(&self, _timeout: Duration) -> Result<(), Error> {
        self.alive.store(false, Ordering::Relaxed);
        self.state
            .foreground
            .lock()
            .expect("unable to get lock")
            .retain(|l| l != &self.label);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}
