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
use std::path::PathBuf;
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use crate::supervisor::Settings;

use super::error::ConfigError;
use super::input::Input;
use super::render::Render;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const DEFAULT_SHUTDOWN_CONFIRM: Duration = Duration::from_secs(2);
const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(50);
const DEFAULT_RECONCILE_PERIOD: Duration = Duration::from_secs(1);
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_IDLE_RETRY: Duration = Duration::from_secs(5);

/// The configuration for the kiosk controller.
#[derive(Deserialize)]
pub struct Kiosk {
    /// The pin wired to the playback trigger button.
    trigger_pin: u8,
    /// The pin wired to the shutdown button.
    shutdown_pin: u8,
    /// The timing file produced by the offline content-preparation tool.
    timings: String,
    /// The digital input source.
    input: Input,
    /// The media renderer.
    render: Render,
    /// The host power-off command. Defaults to "shutdown -h now".
    power_off: Option<Vec<String>>,
    /// How long a level must hold to count as a clean edge.
    debounce: Option<String>,
    /// How long the shutdown input must stay asserted before commit.
    shutdown_confirm: Option<String>,
    /// The control loop period.
    poll_period: Option<String>,
    /// How often to reconcile process liveness against expected state.
    reconcile_period: Option<String>,
    /// How long to wait for a process to stop gracefully.
    stop_timeout: Option<String>,
    /// Minimum gap between consecutive idle launch attempts.
    idle_retry: Option<String>,
}

/// Parses an optional duration field, falling back to the given default.
fn duration(field: &Option<String>, default: Duration) -> Result<Duration, Box<dyn Error>> {
    match field {
        Some(field) => Ok(DurationString::from_string(field.clone())?.into()),
        None => Ok(default),
    }
}

impl Kiosk {
    pub fn trigger_pin(&self) -> u8 {
        self.trigger_pin
    }

    pub fn shutdown_pin(&self) -> u8 {
        self.shutdown_pin
    }

    /// The path to the timing file.
    pub fn timings(&self) -> PathBuf {
        PathBuf::from(&self.timings)
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn render(&self) -> &Render {
        &self.render
    }

    /// The host power-off command.
    pub fn power_off_command(&self) -> Vec<String> {
        self.power_off.clone().unwrap_or_else(|| {
            vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()]
        })
    }

    pub fn debounce(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.debounce, DEFAULT_DEBOUNCE)
    }

    pub fn shutdown_confirm(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.shutdown_confirm, DEFAULT_SHUTDOWN_CONFIRM)
    }

    pub fn poll_period(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.poll_period, DEFAULT_POLL_PERIOD)
    }

    pub fn reconcile_period(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.reconcile_period, DEFAULT_RECONCILE_PERIOD)
    }

    pub fn stop_timeout(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.stop_timeout, DEFAULT_STOP_TIMEOUT)
    }

    pub fn idle_retry(&self) -> Result<Duration, Box<dyn Error>> {
        duration(&self.idle_retry, DEFAULT_IDLE_RETRY)
    }

    /// The control loop settings.
    pub fn settings(&self) -> Result<Settings, Box<dyn Error>> {
        Ok(Settings {
            trigger_pin: self.trigger_pin,
            shutdown_pin: self.shutdown_pin,
            debounce: self.debounce()?,
            confirm_window: self.shutdown_confirm()?,
            poll_period: self.poll_period()?,
            reconcile_period: self.reconcile_period()?,
        })
    }

    /// Validates the configuration without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_pin == self.shutdown_pin {
            return Err(ConfigError::Invalid(format!(
                "trigger and shutdown inputs share pin {}",
                self.trigger_pin
            )));
        }
        self.settings()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.stop_timeout()
            .and(self.idle_retry())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
