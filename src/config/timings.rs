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
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::Segment;

/// A YAML representation of the timing file the offline content-preparation
/// tool emits after probing media durations.
#[derive(Deserialize)]
pub(super) struct Timings {
    /// The segments of the merged content file.
    pub segments: Vec<TimedSegment>,
}

/// One timing entry. Offsets and durations are fractional seconds, matching
/// the probing tool's output.
#[derive(Deserialize)]
pub(super) struct TimedSegment {
    name: String,
    start: f64,
    duration: f64,
}

impl TimedSegment {
    /// Converts the entry to a catalog segment, rejecting values a probe
    /// could only produce by mistake.
    pub fn to_segment(&self) -> Result<Segment, Box<dyn Error>> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(format!("segment '{}' has start {}", self.name, self.start).into());
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(format!("segment '{}' has duration {}", self.name, self.duration).into());
        }

        Ok(Segment {
            name: self.name.clone(),
            start: Duration::from_secs_f64(self.start),
            duration: Duration::from_secs_f64(self.duration),
        })
    }
}
