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
mod catalog;
mod config;
mod debounce;
mod input;
mod machine;
mod power;
mod render;
mod supervisor;
mod util;

use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

use crate::catalog::Catalog;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=video kiosk controller

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/vkiosk
ExecStart=/usr/local/bin/vkiosk start "$VKIOSK_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=vkiosk.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A button-triggered video kiosk controller."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the kiosk controller.
    Start {
        /// The path to the kiosk config.
        config_path: String,
    },
    /// Lists the segments in the configured catalog.
    Segments {
        /// The path to the kiosk config.
        config_path: String,
    },
    /// Verifies the configuration, content files, and segment catalog.
    Check {
        /// The path to the kiosk config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            config::init_supervisor(&PathBuf::from(config_path))?
                .join()
                .await?;
        }
        Commands::Segments { config_path } => {
            let kiosk = config::load(&PathBuf::from(config_path))?;
            let catalog = Catalog::new(config::parse_timings(&kiosk.timings())?)?;

            if catalog.is_empty() {
                println!("No segments found in {}.", kiosk.timings().display());
                return Ok(());
            }

            print!("{}", catalog);
        }
        Commands::Check { config_path } => {
            let kiosk = config::load(&PathBuf::from(config_path))?;
            kiosk.validate()?;
            println!("Configuration OK.");

            kiosk.render().verify()?;
            println!("Content files OK.");

            let catalog = Catalog::new(config::parse_timings(&kiosk.timings())?)?;
            println!("Catalog OK ({} segments).", catalog.len());
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
