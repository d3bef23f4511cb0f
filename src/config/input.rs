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
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

/// Allows users to specify the digital input source.
#[derive(Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Input {
    Gpio(Gpio),
    /// All pins read released. Useful for exercising the display path on a
    /// machine without buttons.
    Mock,
}

/// The sysfs GPIO configuration.
#[derive(Deserialize, Clone)]
pub struct Gpio {
    /// The sysfs GPIO root. Defaults to /sys/class/gpio.
    root: Option<String>,
}

const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

impl Input {
    /// Builds the input source for the given pins.
    pub fn source(&self, pins: &[u8]) -> Result<Arc<dyn crate::input::Source>, Box<dyn Error>> {
        Ok(match self {
            Input::Gpio(gpio) => Arc::new(crate::input::sysfs::Source::new(
                Path::new(gpio.root.as_deref().unwrap_or(DEFAULT_GPIO_ROOT)),
                pins.to_vec(),
            )?),
            Input::Mock => Arc::new(crate::input::mock::Source::new()),
        })
    }
}
