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
use core::fmt;
use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use tracing::{info, span, Level, Span};

use crate::util;

/// One addressable, time-bounded unit of playable content. Segments are
/// offsets into a single merged media file, as produced by the offline
/// timing tool.
pub struct Segment {
    /// The name of the segment.
    pub name: String,
    /// Where the segment starts within the merged file.
    pub start: Duration,
    /// How long the segment plays for.
    pub duration: Duration,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (start: {}, duration: {})",
            self.name,
            util::duration_minutes_seconds(self.start),
            util::duration_minutes_seconds(self.duration)
        )
    }
}

/// The set of segments available for playback. The catalog is loaded once at
/// startup and is immutable afterwards; the only mutable state is which
/// segment was most recently picked, used to avoid immediate repeats.
pub struct Catalog {
    /// The segments, in the order they appear in the timing file.
    segments: Vec<Arc<Segment>>,
    /// The index of the most recently picked segment.
    last: RwLock<Option<usize>>,
    /// The logging span.
    span: Span,
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Catalog ({} segments):", self.segments.len())?;
        for segment in self.segments.iter() {
            writeln!(f, "  - {}", segment)?;
        }

        Ok(())
    }
}

impl Catalog {
    /// Creates a new catalog. Segment names must be unique and durations must
    /// be non-zero.
    pub fn new(segments: Vec<Segment>) -> Result<Catalog, Box<dyn Error>> {
        let mut names: HashSet<&str> = HashSet::new();
        for segment in segments.iter() {
            if !names.insert(&segment.name) {
                return Err(format!("duplicate segment name '{}'", segment.name).into());
            }
            if segment.duration.is_zero() {
                return Err(format!("segment '{}' has a zero duration", segment.name).into());
            }
        }

        Ok(Catalog {
            segments: segments.into_iter().map(Arc::new).collect(),
            last: RwLock::new(None),
            span: span!(Level::INFO, "catalog"),
        })
    }

    /// An empty catalog. Triggers against an empty catalog are logged and
    /// ignored, so this is the degraded fallback when the timing file is
    /// missing or malformed.
    pub fn empty() -> Catalog {
        Catalog {
            segments: Vec::new(),
            last: RwLock::new(None),
            span: span!(Level::INFO, "catalog"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The segments in their stable, as-loaded order.
    pub fn list(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    /// Picks a segment uniformly at random, excluding the most recently
    /// picked segment whenever more than one segment exists. With a single
    /// segment the exclusion would empty the candidate set, so that segment
    /// is picked again. Returns None for an empty catalog.
    pub fn pick(&self) -> Option<Arc<Segment>> {
        self.pick_with(&mut rand::thread_rng())
    }

    fn pick_with<R: Rng>(&self, rng: &mut R) -> Option<Arc<Segment>> {
        let _enter = self.span.enter();

        if self.segments.is_empty() {
            return None;
        }

        let mut last = self.last.write().expect("unable to get lock");
        let index = match (*last, self.segments.len()) {
            (_, 1) => 0,
            (None, n) => rng.gen_range(0..n),
            (Some(previous), n) => {
                // Draw from the n-1 remaining indices and skip past the
                // previous one.
                let drawn = rng.gen_range(0..n - 1);
                if drawn >= previous {
                    drawn + 1
                } else {
                    drawn
                }
            }
        };
        *last = Some(index);

        let segment = &self.segments[index];
        info!(segment = segment.name, "Selected segment.");
        Some(Arc::clone(segment))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{Catalog, Segment};

    fn segment(name: &str, start: u64, duration: u64) -> Segment {
        Segment {
            name: name.to_string(),
            start: Duration::from_secs(start),
            duration: Duration::from_secs(duration),
        }
    }

    #[test]
    fn test_validation() {
        assert!(Catalog::new(vec![segment("a", 0, 10), segment("a", 10, 10)]).is_err());
        assert!(Catalog::new(vec![segment("a", 0, 0)]).is_err());
        assert!(Catalog::new(vec![segment("a", 0, 10), segment("b", 10, 5)]).is_ok());
    }

    #[test]
    fn test_empty_catalog_picks_nothing() {
        let catalog = Catalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.pick().is_none());
    }

    #[test]
    fn test_single_segment_repeats() {
        let catalog = Catalog::new(vec![segment("only", 0, 10)]).expect("catalog");
        for _ in 0..10 {
            assert_eq!("only", catalog.pick().expect("segment").name);
        }
    }

    #[test]
    fn test_never_repeats_the_previous_pick() {
        let catalog = Catalog::new(vec![
            segment("a", 0, 10),
            segment("b", 10, 10),
            segment("c", 20, 10),
        ])
        .expect("catalog");

        let mut rng = StdRng::seed_from_u64(42);
        let mut previous = catalog.pick_with(&mut rng).expect("segment").name.clone();
        for _ in 0..10_000 {
            let picked = catalog.pick_with(&mut rng).expect("segment").name.clone();
            assert_ne!(previous, picked);
            previous = picked;
        }
    }

    #[test]
    fn test_all_segments_are_reachable() {
        let catalog = Catalog::new(vec![
            segment("a", 0, 10),
            segment("b", 10, 10),
            segment("c", 20, 10),
        ])
        .expect("catalog");

        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(catalog.pick_with(&mut rng).expect("segment").name.clone());
        }
        assert_eq!(3, seen.len());
    }
}
