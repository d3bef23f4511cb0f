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
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::Level;

/// A mock input source with externally scripted levels. Pins that have not
/// been set read as Released.
#[derive(Clone)]
pub struct Source {
    levels: Arc<Mutex<HashMap<u8, Level>>>,
    fail_reads: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl Source {
    pub fn new() -> Source {
        Source {
            levels: Arc::new(Mutex::new(HashMap::new())),
            fail_reads: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the level a pin will read at.
    pub fn set(&self, pin: u8, level: Level) {
        self.levels
            .lock()
            .expect("unable to get lock")
            .insert(pin, level);
    }

    /// Makes all subsequent reads fail, simulating a lost input device.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::Relaxed);
    }

    /// Returns true once release has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Relaxed)
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Source for Source {
    fn read(&self, pin: u8) -> Result<Level, io::Error> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "mock input read failure",
            ));
        }

        Ok(*self
            .levels
            .lock()
            .expect("unable to get lock")
            .get(&pin)
            .unwrap_or(&Level::Released))
    }

    fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }
}
