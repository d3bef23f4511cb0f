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
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::catalog::{Catalog, Segment};
use crate::machine::Machine;
use crate::power;
use crate::supervisor::Supervisor;
use crate::util;

mod error;
mod input;
mod kiosk;
mod render;
mod timings;

pub use error::ConfigError;
pub use kiosk::Kiosk;

/// Loads the kiosk configuration from a YAML file.
pub fn load(path: &Path) -> Result<Kiosk, ConfigError> {
    Ok(config::Config::builder()
        .add_source(config::File::from(path))
        .build()?
        .try_deserialize::<Kiosk>()?)
}

/// Parses the timing file emitted by the offline content-preparation tool
/// into validated segments.
pub fn parse_timings(file: &Path) -> Result<Vec<Segment>, Box<dyn Error>> {
    let timings: timings::Timings = serde_yml::from_str(&fs::read_to_string(file)?)?;
    timings
        .segments
        .into_iter()
        .map(|segment| segment.to_segment())
        .collect()
}

/// Loads the segment catalog, falling back to an empty catalog if the timing
/// file is missing or malformed. The kiosk still runs in that case; triggers
/// are logged and ignored until the catalog is fixed.
pub fn load_catalog(file: &Path) -> Arc<Catalog> {
    match parse_timings(file).and_then(Catalog::new) {
        Ok(catalog) => {
            info!(
                file = util::filename_display(file),
                segments = catalog.len(),
                "Loaded segment catalog."
            );
            Arc::new(catalog)
        }
        Err(e) => {
            error!(
                file = util::filename_display(file),
                err = e.as_ref(),
                "Unable to load timing file, falling back to an empty catalog."
            );
            Arc::new(Catalog::empty())
        }
    }
}

/// Initializes the supervisor from the given config file and returns it. The
/// supervisor owns the state machine and can be waited on until it exits.
pub fn init_supervisor(path: &Path) -> Result<Supervisor, Box<dyn Error>> {
    let config = load(path)?;
    config.validate()?;

    let catalog = load_catalog(&config.timings());
    let renderer = config.render().renderer();
    let source = config
        .input()
        .source(&[config.trigger_pin(), config.shutdown_pin()])?;
    let machine = Machine::new(
        catalog,
        renderer,
        Arc::new(power::Host::new(config.power_off_command())),
        config.stop_timeout()?,
        config.idle_retry()?,
    );

    Ok(Supervisor::new(machine, source, config.settings()?))
}
