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
use std::time::{Duration, Instant};

use crate::input::Level;

/// A stabilized input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// The input settled on the asserted level.
    Asserted,
    /// The input settled on the released level.
    Released,
}

/// Filters raw input samples into clean edges. A level change is only
/// accepted once the new level has held continuously for the configured
/// window, which suppresses the mechanical bounce of physical switches.
///
/// The debouncer has no side effects; it is driven entirely by the
/// (level, timestamp) samples fed to [`Debouncer::observe`].
pub struct Debouncer {
    /// The minimum time a new level must hold before it is accepted.
    window: Duration,
    /// The last accepted level.
    stable: Level,
    /// A level change waiting out the window, with the time it was first seen.
    candidate: Option<(Level, Instant)>,
}

impl Debouncer {
    /// Creates a new debouncer. The initial level is treated as already
    /// stable, so no edge is emitted for it.
    pub fn new(initial: Level, window: Duration) -> Debouncer {
        Debouncer {
            window,
            stable: initial,
            candidate: None,
        }
    }

    /// Feeds one raw sample to the debouncer. Returns an edge when, and only
    /// when, a changed level has held for the full window. Repeated samples
    /// of an already stable level return nothing.
    pub fn observe(&mut self, raw: Level, now: Instant) -> Option<Edge> {
        if raw == self.stable {
            // Any shorter-lived excursion was bounce.
            self.candidate = None;
            return None;
        }

        match self.candidate {
            Some((level, since)) if level == raw => {
                if now.duration_since(since) >= self.window {
                    self.stable = raw;
                    self.candidate = None;
                    Some(match raw {
                        Level::Asserted => Edge::Asserted,
                        Level::Released => Edge::Released,
                    })
                } else {
                    None
                }
            }
            _ => {
                self.candidate = Some((raw, now));
                None
            }
        }
    }

    /// The last accepted level.
    pub fn stable(&self) -> Level {
        self.stable
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, Instant};

    use crate::input::Level;

    use super::{Debouncer, Edge};

    const TICK: Duration = Duration::from_millis(10);
    const WINDOW: Duration = Duration::from_millis(150);

    /// Runs a sample sequence at a fixed spacing and collects emitted edges.
    fn run(debouncer: &mut Debouncer, start: Instant, samples: &[Level]) -> Vec<Edge> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, level)| debouncer.observe(*level, start + TICK * (i as u32)))
            .collect()
    }

    #[test]
    fn test_stable_level_emits_nothing() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        let edges = run(&mut debouncer, start, &[Level::Released; 100]);
        assert!(edges.is_empty());
        assert_eq!(Level::Released, debouncer.stable());
    }

    #[test]
    fn test_bounce_shorter_than_window_is_suppressed() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        // Alternating samples never hold long enough to stabilize.
        let samples: Vec<Level> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    Level::Asserted
                } else {
                    Level::Released
                }
            })
            .collect();
        let edges = run(&mut debouncer, start, &samples);
        assert!(edges.is_empty());
        assert_eq!(Level::Released, debouncer.stable());
    }

    #[test]
    fn test_single_edge_per_stabilization() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        // A short blip, a bounce back, then a long press: exactly one
        // asserted edge once the press has held for the window.
        let mut samples = vec![Level::Released; 3];
        samples.push(Level::Asserted);
        samples.extend(vec![Level::Released; 20]);
        samples.extend(vec![Level::Asserted; 50]);

        let edges = run(&mut debouncer, start, &samples);
        assert_eq!(vec![Edge::Asserted], edges);
        assert_eq!(Level::Asserted, debouncer.stable());
    }

    #[test]
    fn test_edge_at_exactly_the_window() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        assert_eq!(None, debouncer.observe(Level::Asserted, start));
        assert_eq!(None, debouncer.observe(Level::Asserted, start + WINDOW - TICK));
        assert_eq!(
            Some(Edge::Asserted),
            debouncer.observe(Level::Asserted, start + WINDOW)
        );
        // Continuing to hold emits nothing further.
        assert_eq!(None, debouncer.observe(Level::Asserted, start + WINDOW * 2));
    }

    #[test]
    fn test_release_edge_after_press() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        let mut samples = vec![Level::Asserted; 20];
        samples.extend(vec![Level::Released; 20]);

        let edges = run(&mut debouncer, start, &samples);
        assert_eq!(vec![Edge::Asserted, Edge::Released], edges);
        assert_eq!(Level::Released, debouncer.stable());
    }

    #[test]
    fn test_interrupted_candidate_restarts_the_window() {
        let mut debouncer = Debouncer::new(Level::Released, WINDOW);
        let start = Instant::now();

        // Half a window of assertion, one released sample, then another
        // half window: the window restarts at the second run.
        let mut samples = vec![Level::Asserted; 7];
        samples.push(Level::Released);
        samples.extend(vec![Level::Asserted; 7]);

        let edges = run(&mut debouncer, start, &samples);
        assert!(edges.is_empty());
    }
}
