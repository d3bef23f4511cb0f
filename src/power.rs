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
use std::process::Command;

use tracing::{info, span, Level, Span};

/// The host power-off action. Invoked exactly once on a confirmed shutdown;
/// the host is expected to terminate this process as part of powering off,
/// so no return is expected in the success case.
pub trait PowerOff: Send + Sync {
    fn power_off(&self) -> Result<(), Box<dyn Error>>;
}

/// Powers the host off by running a configured command.
pub struct Host {
    /// The command and its arguments.
    command: Vec<String>,
    /// The logging span.
    span: Span,
}

impl Host {
    pub fn new(command: Vec<String>) -> Host {
        Host {
            command,
            span: span!(Level::INFO, "power"),
        }
    }
}

impl PowerOff for Host {
    fn power_off(&self) -> Result<(), Box<dyn Error>> {
        let _enter = self.span.enter();

        let (program, args) = match self.command.split_first() {
            Some(split) => split,
            None => return Err("no power-off command configured".into()),
        };

        info!(command = self.command.join(" "), "Powering off the host.");
        let status = Command::new(program).args(args).status()?;
        if !status.success() {
            return Err(format!("power-off command exited with {}", status).into());
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A mock power-off action that counts invocations.
    #[derive(Clone)]
    pub struct PowerOff {
        invocations: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    impl PowerOff {
        pub fn new() -> PowerOff {
            PowerOff {
                invocations: Arc::new(AtomicUsize::new(0)),
                fail: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn invocations(&self) -> usize {
            self.invocations.load(Ordering::Relaxed)
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::Relaxed);
        }
    }

    impl super::PowerOff for PowerOff {
        fn power_off(&self) -> Result<(), Box<dyn Error>> {
            self.invocations.fetch_add(1, Ordering::Relaxed);
            if self.fail.load(Ordering::Relaxed) {
                return Err("injected power-off failure".into());
            }
            Ok(())
        }
    }
}
