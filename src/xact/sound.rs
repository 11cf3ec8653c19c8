// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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

//! Sound definitions and the voices built from them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::device::AudioDevice;
use crate::instance::{FilterSettings, SoundEffect, SoundEffectInstance};

use super::dsp::DspPreset;
use super::error::{AudioError, Result};
use super::rpc::Rpc;

/// One wave played as part of a sound.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipDefinition {
    pub wave: String,
    /// Linear gain, multiplied with the sound's gain.
    pub volume: f32,
    /// Octaves, added to the sound's pitch.
    pub pitch: f32,
    pub pan: f32,
    pub delay: Duration,
    pub looped: bool,
    pub filter: Option<FilterSettings>,
}

impl ClipDefinition {
    /// A clip playing `wave` as authored.
    pub fn new(wave: &str) -> ClipDefinition {
        ClipDefinition {
            wave: wave.to_string(),
            volume: 1.0,
            pitch: 0.0,
            pan: 0.0,
            delay: Duration::ZERO,
            looped: false,
            filter: None,
        }
    }
}

/// An abstract sound: a set of clips started together, the curves that shape
/// them, and an optional reverb send.
#[derive(Debug)]
pub struct SoundDefinition {
    name: String,
    volume: f32,
    pitch: f32,
    clips: Vec<ClipDefinition>,
    rpcs: Vec<Arc<Rpc>>,
    reverb: Option<Arc<DspPreset>>,
}

/// A voice of a playing sound with its authored gain and pitch.
pub struct SoundInstance {
    pub instance: SoundEffectInstance,
    pub volume: f32,
    pub pitch: f32,
}

impl SoundDefinition {
    pub fn new(
        name: &str,
        volume: f32,
        pitch: f32,
        clips: Vec<ClipDefinition>,
        rpcs: Vec<Arc<Rpc>>,
        reverb: Option<Arc<DspPreset>>,
    ) -> SoundDefinition {
        SoundDefinition {
            name: name.to_string(),
            volume,
            pitch,
            clips,
            rpcs,
            reverb,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn clips(&self) -> &[ClipDefinition] {
        &self.clips
    }

    pub fn rpcs(&self) -> &[Arc<Rpc>] {
        &self.rpcs
    }

    pub fn reverb(&self) -> Option<&Arc<DspPreset>> {
        self.reverb.as_ref()
    }

    /// Builds one voice per clip. Nothing is started.
    pub fn instantiate(
        &self,
        device: &Arc<AudioDevice>,
        waves: &HashMap<String, Arc<SoundEffect>>,
    ) -> Result<Vec<SoundInstance>> {
        let reverb = self.reverb.as_ref().and_then(|preset| preset.reverb());
        let voices = self
            .clips
            .iter()
            .map(|clip| {
                let wave = waves
                    .get(&clip.wave)
                    .ok_or_else(|| AudioError::UnknownWave(clip.wave.clone()))?;
                let mut instance = SoundEffectInstance::new(device.clone(), Some(wave.clone()));
                instance.set_pan(clip.pan);
                instance.set_looped(clip.looped);
                instance.set_start_delay(clip.delay);
                instance.set_filter(clip.filter);
                instance.set_reverb(reverb);
                Ok(SoundInstance {
                    instance,
                    volume: self.volume * clip.volume,
                    pitch: self.pitch + clip.pitch,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(sound = %self.name, voices = voices.len(), "Built sound voices");
        Ok(voices)
    }
}
