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
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

/// Allows users to specify the media renderer.
#[derive(Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Render {
    Vlc(Vlc),
    /// Renders nothing. Useful for bench-testing the input path on a
    /// machine without a display.
    Mock,
}

/// The VLC renderer configuration.
#[derive(Deserialize, Clone)]
pub struct Vlc {
    /// The VLC binary to launch. Defaults to cvlc.
    binary: Option<String>,
    /// The merged content file holding every segment.
    content: String,
    /// Looped filler shown between triggers.
    idle: Option<String>,
    /// Played once at startup.
    chime: Option<String>,
    /// An ALSA device to pin audio output to, e.g. hw:0,0.
    alsa_device: Option<String>,
    /// Extra arguments appended to every launch.
    extra_args: Option<Vec<String>>,
}

const DEFAULT_VLC_BINARY: &str = "cvlc";

impl Render {
    /// Builds the renderer.
    pub fn renderer(&self) -> Arc<dyn crate::render::Renderer> {
        match self {
            Render::Vlc(vlc) => Arc::new(crate::render::vlc::Renderer::new(
                vlc.binary
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VLC_BINARY.to_string()),
                PathBuf::from(&vlc.content),
                vlc.idle.as_ref().map(PathBuf::from),
                vlc.chime.as_ref().map(PathBuf::from),
                vlc.alsa_device.clone(),
                vlc.extra_args.clone().unwrap_or_default(),
            )),
            Render::Mock => Arc::new(crate::render::mock::Renderer::new()),
        }
    }

    /// Verifies that every configured content file exists.
    pub fn verify(&self) -> Result<(), Box<dyn Error>> {
        let vlc = match self {
            Render::Vlc(vlc) => vlc,
            Render::Mock => return Ok(()),
        };

        for file in [Some(&vlc.content), vlc.idle.as_ref(), vlc.chime.as_ref()]
            .into_iter()
            .flatten()
        {
            if !Path::new(file).exists() {
                return Err(format!("content file {} does not exist", file).into());
            }
        }
        Ok(())
    }
}
