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
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, span, Level, Span};

use crate::catalog::Segment;
use crate::render::Error;
use crate::util;

/// How long after spawning to check that the process is still up. Catches
/// launches that die immediately on bad content or a missing display.
const LAUNCH_VERIFY: Duration = Duration::from_millis(50);

/// How often to poll for exit while waiting out a graceful stop.
const STOP_POLL: Duration = Duration::from_millis(25);

/// A renderer that launches one VLC process per presentation and kills it on
/// handoff. Segment playback is a start/stop time window into the single
/// merged content file.
pub struct Renderer {
    /// The VLC binary, normally cvlc.
    binary: String,
    /// The merged content file holding every segment.
    content: PathBuf,
    /// Looped filler shown between triggers.
    idle: Option<PathBuf>,
    /// Played once at startup.
    chime: Option<PathBuf>,
    /// An ALSA device to pin audio output to.
    alsa_device: Option<String>,
    /// Extra arguments appended to every launch.
    extra_args: Vec<String>,
    /// The logging span.
    span: Span,
}

impl Renderer {
    pub fn new(
        binary: String,
        content: PathBuf,
        idle: Option<PathBuf>,
        chime: Option<PathBuf>,
        alsa_device: Option<String>,
        extra_args: Vec<String>,
    ) -> Renderer {
        Renderer {
            binary,
            content,
            idle,
            chime,
            alsa_device,
            extra_args,
            span: span!(Level::INFO, "vlc"),
        }
    }

    /// Spawns a VLC process and verifies it survives its launch window.
    fn spawn(&self, args: Vec<String>) -> Result<ProcessHandle, Error> {
        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .args(&self.extra_args)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(alsa_device) = &self.alsa_device {
            command
                .arg("--aout=alsa")
                .arg(format!("--alsa-audio-device={}", alsa_device));
        }

        let mut child = command.spawn().map_err(|source| Error::Launch {
            program: self.binary.clone(),
            source,
        })?;

        thread::sleep(LAUNCH_VERIFY);
        match child.try_wait() {
            // A successful immediate exit is fine: a very short chime can
            // legitimately finish inside the verify window.
            Ok(Some(status)) if !status.success() => {
                return Err(Error::EarlyExit {
                    program: self.binary.clone(),
                    status,
                })
            }
            Err(source) => return Err(Error::Signal(source)),
            _ => {}
        }

        Ok(ProcessHandle {
            child: Mutex::new(child),
        })
    }
}

impl super::Renderer for Renderer {
    fn start_idle(&self) -> Result<Option<Box<dyn super::Handle>>, Error> {
        let _enter = self.span.enter();

        let idle = match &self.idle {
            Some(idle) => idle,
            None => return Ok(None),
        };

        info!(file = util::filename_display(idle), "Starting idle visual.");
        let handle = self.spawn(vec![
            "--fullscreen".to_string(),
            "--no-osd".to_string(),
            "--loop".to_string(),
            idle.display().to_string(),
        ])?;
        Ok(Some(Box::new(handle)))
    }

    fn start_segment(&self, segment: &Segment) -> Result<Box<dyn super::Handle>, Error> {
        let _enter = self.span.enter();

        let start = segment.start.as_secs_f64();
        let stop = start + segment.duration.as_secs_f64();
        info!(
            segment = segment.name,
            file = util::filename_display(&self.content),
            "Starting segment."
        );
        let handle = self.spawn(vec![
            "--fullscreen".to_string(),
            "--no-osd".to_string(),
            "--play-and-exit".to_string(),
            format!("--start-time={:.3}", start),
            format!("--stop-time={:.3}", stop),
            self.content.display().to_string(),
        ])?;
        Ok(Box::new(handle))
    }

    fn start_chime(&self) -> Result<Option<Box<dyn super::Handle>>, Error> {
        let _enter = self.span.enter();

        let chime = match &self.chime {
            Some(chime) => chime,
            None => return Ok(None),
        };

        info!(file = util::filename_display(chime), "Playing startup chime.");
        let handle = self.spawn(vec![
            "--no-osd".to_string(),
            "--play-and-exit".to_string(),
            chime.display().to_string(),
        ])?;
        Ok(Some(Box::new(handle)))
    }
}

/// A handle on one spawned VLC process.
pub struct ProcessHandle {
    child: Mutex<Child>,
}

impl super::Handle for ProcessHandle {
    fn stop(&self, timeout: Duration) -> Result<(), Error> {
        let mut child = self.child.lock().expect("unable to get lock");

        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        // SIGTERM first so VLC can tear down its video output cleanly.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return Ok(());
            }
            thread::sleep(STOP_POLL);
        }

        child.kill().map_err(Error::Signal)?;
        child.wait().map_err(Error::Signal)?;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        let mut child = self.child.lock().expect("unable to get lock");
        matches!(child.try_wait(), Ok(None))
    }
}
