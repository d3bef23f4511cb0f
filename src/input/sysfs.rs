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
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, span, warn, Level as LogLevel, Span};

use super::Level;

/// A digital input source backed by the sysfs GPIO interface. Pins are
/// exported and set as inputs on construction and unexported on release.
///
/// The buttons are wired with pull-ups, so the line reads low while the
/// button is held: a value of `0` is Asserted.
pub struct Source {
    /// The sysfs GPIO root, normally /sys/class/gpio.
    root: PathBuf,
    /// The pins this source manages.
    pins: Vec<u8>,
    /// The logging span.
    span: Span,
}

impl Source {
    /// Creates a new source, exporting each pin and configuring it as an
    /// input.
    pub fn new(root: &Path, pins: Vec<u8>) -> Result<Source, io::Error> {
        let source = Source {
            root: root.to_path_buf(),
            pins,
            span: span!(LogLevel::INFO, "gpio"),
        };
        let _enter = source.span.clone().entered();

        for pin in source.pins.iter() {
            let pin_dir = source.pin_dir(*pin);
            if !pin_dir.exists() {
                fs::write(source.root.join("export"), pin.to_string())?;
                // The kernel needs a moment to populate the pin directory
                // before direction can be written.
                thread::sleep(Duration::from_millis(100));
            }
            fs::write(pin_dir.join("direction"), "in")?;
            info!(pin = pin, "Exported input pin.");
        }

        Ok(source)
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }
}

impl super::Source for Source {
    fn read(&self, pin: u8) -> Result<Level, io::Error> {
        let value = fs::read_to_string(self.pin_dir(pin).join("value"))?;
        match value.trim() {
            // Active low: the pull-up holds the line high until the button
            // pulls it to ground.
            "0" => Ok(Level::Asserted),
            "1" => Ok(Level::Released),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected GPIO value '{}' for pin {}", other, pin),
            )),
        }
    }

    fn release(&self) {
        let _enter = self.span.enter();

        for pin in self.pins.iter() {
            if let Err(e) = fs::write(self.root.join("unexport"), pin.to_string()) {
                warn!(pin = pin, err = e.to_string(), "Error unexporting pin.");
            }
        }
    }
}
