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
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use crate::catalog::Segment;

pub mod mock;
pub mod vlc;

/// Errors from launching or stopping rendering processes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to launch {program}: {source}")]
    Launch { program: String, source: io::Error },

    #[error("{program} exited immediately with {status}")]
    EarlyExit { program: String, status: ExitStatus },

    #[error("error signaling process: {0}")]
    Signal(io::Error),
}

/// One launched rendering process. Handles are owned by the state machine,
/// which is the sole authority over which handle holds the display and audio
/// output at any moment.
pub trait Handle: Send + Sync {
    /// Requests graceful termination, forcing it if the process has not
    /// exited within the timeout. Stopping an already stopped handle
    /// succeeds trivially.
    fn stop(&self, timeout: Duration) -> Result<(), Error>;

    /// Non-blocking liveness probe.
    fn is_alive(&self) -> bool;
}

/// Launches rendering processes. The state machine is written against this
/// contract only; whether an implementation kills and relaunches per segment,
/// pre-launches everything paused, or drives one process over a control
/// channel is its own business.
pub trait Renderer: Send + Sync {
    /// Begins the idle presentation. Returns None when no idle content is
    /// configured; idle absence is degraded but safe, not fatal.
    fn start_idle(&self) -> Result<Option<Box<dyn Handle>>, Error>;

    /// Begins rendering the given segment from its start offset for its
    /// duration. By the time this returns, rendering has either observably
    /// begun or the failure is reported.
    fn start_segment(&self, segment: &Segment) -> Result<Box<dyn Handle>, Error>;

    /// Plays the startup chime, if one is configured. The caller is not
    /// expected to retain the handle; the process plays and exits on its own.
    fn start_chime(&self) -> Result<Option<Box<dyn Handle>>, Error>;
}
