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

//! Playback instances.
//!
//! A [`SoundEffect`] owns one backend buffer. A [`SoundEffectInstance`] is a single
//! voice playing that buffer. The instance caches every parameter and only forwards
//! it to the backend while it holds a source, so parameters can be set before play.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use tracing::{debug, warn};

use crate::backend::{
    BufferData, BufferDesc, BufferHandle, FilterHandle, FilterKind, ReverbHandle, SourceHandle,
    SourceState,
};
use crate::device::AudioDevice;

pub mod dynamic;

/// Sample payload owned by a wave.
#[derive(Clone, Debug, PartialEq)]
pub enum WaveSamples {
    Bytes(Vec<u8>),
    Float(Vec<f32>),
}

/// Decoded wave data ready to be uploaded into a backend buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveData {
    pub samples: WaveSamples,
    pub sample_rate: u32,
    pub channels: u16,
    /// Loop region start, in sample frames.
    pub loop_start: u32,
    /// Loop region length, in sample frames. Zero loops the whole wave.
    pub loop_length: u32,
    pub is_adpcm: bool,
    pub format_parameter: u32,
}

impl WaveData {
    /// Float PCM data with no loop region.
    pub fn float(samples: Vec<f32>, sample_rate: u32, channels: u16) -> WaveData {
        WaveData {
            samples: WaveSamples::Float(samples),
            sample_rate,
            channels,
            loop_start: 0,
            loop_length: 0,
            is_adpcm: false,
            format_parameter: 32,
        }
    }

    /// Silence of the given length. Used for headless simulation.
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> WaveData {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        WaveData::float(
            vec![0.0; frames * usize::from(channels)],
            sample_rate,
            channels,
        )
    }

    /// Length of the wave in sample frames.
    pub fn frames(&self) -> usize {
        let channels = usize::from(self.channels.max(1));
        match &self.samples {
            WaveSamples::Float(samples) => samples.len() / channels,
            WaveSamples::Bytes(bytes) => {
                let bytes_per_sample = (self.format_parameter as usize / 8).max(1);
                if self.is_adpcm {
                    // Block aligned data has no fixed frame size.
                    0
                } else {
                    bytes.len() / bytes_per_sample / channels
                }
            }
        }
    }

    fn desc(&self) -> BufferDesc<'_> {
        BufferDesc {
            data: match &self.samples {
                WaveSamples::Bytes(bytes) => BufferData::Bytes(bytes),
                WaveSamples::Float(samples) => BufferData::Float(samples),
            },
            sample_rate: self.sample_rate,
            channels: self.channels,
            loop_start: self.loop_start,
            loop_length: self.loop_length,
            is_adpcm: self.is_adpcm,
            format_parameter: self.format_parameter,
        }
    }
}

/// A filter applied to a voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterSettings {
    pub kind: FilterKind,
    pub frequency: f32,
    pub q_factor: f32,
}

/// A wave loaded into a backend buffer.
pub struct SoundEffect {
    name: String,
    device: Arc<AudioDevice>,
    buffer: BufferHandle,
    frames: usize,
    sample_rate: u32,
}

impl SoundEffect {
    /// Uploads the wave into a new backend buffer. Returns `None` if the backend is out
    /// of buffers.
    pub fn new(device: Arc<AudioDevice>, name: &str, wave: &WaveData) -> Option<Arc<SoundEffect>> {
        let Some(buffer) = device.gen_buffer_with(&wave.desc()) else {
            warn!(wave = name, "Unable to generate a buffer for wave");
            return None;
        };
        debug!(wave = name, frames = wave.frames(), "Loaded wave");
        Some(Arc::new(SoundEffect {
            name: name.to_string(),
            device,
            buffer,
            frames: wave.frames(),
            sample_rate: wave.sample_rate,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Playback length at the natural pitch.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate))
    }

    /// Creates an instance the caller owns.
    pub fn create_instance(self: &Arc<Self>) -> SoundEffectInstance {
        SoundEffectInstance::new(self.device.clone(), Some(self.clone()))
    }

    /// Fire-and-forget playback. The device owns the instance until it stops.
    pub fn play(self: &Arc<Self>, volume: f32, pitch: f32, pan: f32) -> bool {
        let mut instance = self.create_instance();
        instance.set_volume(volume);
        instance.set_pitch(pitch);
        instance.set_pan(pan);
        if !instance.play() {
            return false;
        }
        self.device.track_instance(instance);
        true
    }
}

impl fmt::Debug for SoundEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundEffect")
            .field("name", &self.name)
            .field("buffer", &self.buffer)
            .field("frames", &self.frames)
            .finish()
    }
}

impl Drop for SoundEffect {
    fn drop(&mut self) {
        self.device.delete_buffer(self.buffer);
    }
}

/// A single non-streaming voice.
pub struct SoundEffectInstance {
    device: Arc<AudioDevice>,
    effect: Option<Arc<SoundEffect>>,
    source: Option<SourceHandle>,

    volume: f32,
    pitch: f32,
    /// Pitch set through the runtime is not clamped by the backend.
    clamp_pitch: bool,
    pan: f32,
    looped: bool,
    position: Option<Vec3>,
    reverb: Option<ReverbHandle>,
    filter_settings: Option<FilterSettings>,
    filter: Option<FilterHandle>,

    start_delay: Duration,
    /// When the current delayed start was first requested.
    delay_started: Option<Duration>,
    pending_start: bool,
}

impl SoundEffectInstance {
    pub fn new(device: Arc<AudioDevice>, effect: Option<Arc<SoundEffect>>) -> SoundEffectInstance {
        SoundEffectInstance {
            device,
            effect,
            source: None,
            volume: 1.0,
            pitch: 0.0,
            clamp_pitch: true,
            pan: 0.0,
            looped: false,
            position: None,
            reverb: None,
            filter_settings: None,
            filter: None,
            start_delay: Duration::ZERO,
            delay_started: None,
            pending_start: false,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
        self.push_volume();
    }

    /// Pitch in octaves.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Sets pitch in octaves, limited to [-1, 1].
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(-1.0, 1.0);
        self.clamp_pitch = true;
        self.push_pitch();
    }

    /// Sets pitch without limiting it. RPC driven pitch may exceed an octave.
    pub(crate) fn set_pitch_unclamped(&mut self, pitch: f32) {
        self.pitch = pitch;
        self.clamp_pitch = false;
        self.push_pitch();
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
        if let Some(source) = self.source {
            self.device.backend().set_source_pan(source, self.pan);
        }
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
        if let Some(source) = self.source {
            self.device.backend().set_source_looped(source, looped);
        }
    }

    /// Listener-space position, if this voice is positional.
    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = Some(position);
        if let Some(source) = self.source {
            self.device.backend().set_source_position(source, position);
        }
    }

    /// Routes this voice into a reverb.
    pub fn set_reverb(&mut self, reverb: Option<ReverbHandle>) {
        self.reverb = reverb;
        if let Some(source) = self.source {
            self.device.backend().set_source_reverb(source, reverb);
        }
    }

    /// Sets the filter applied from the next play onwards.
    pub fn set_filter(&mut self, filter: Option<FilterSettings>) {
        self.filter_settings = filter;
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn set_start_delay(&mut self, delay: Duration) {
        self.start_delay = delay;
    }

    /// True while a delayed start has been requested but has not happened yet.
    pub fn pending_start(&self) -> bool {
        self.pending_start
    }

    /// The backend voice, if one is allocated.
    pub fn source(&self) -> Option<SourceHandle> {
        self.source
    }

    pub fn state(&self) -> SourceState {
        match self.source {
            Some(source) => self.device.backend().source_state(source),
            None => SourceState::Stopped,
        }
    }

    /// True once the voice has stopped and has no start pending.
    pub fn is_finished(&self) -> bool {
        !self.pending_start && self.state() == SourceState::Stopped
    }

    /// Starts the voice, regenerating its backend source.
    ///
    /// With a start delay the first call only arms the timer. The owner is expected to
    /// call again every tick until this returns true. Returns false as well if the
    /// backend could not provide a source, in which case the voice is dropped.
    pub fn play(&mut self) -> bool {
        if !self.start_delay.is_zero() {
            let now = self.device.now();
            let started = *self.delay_started.get_or_insert(now);
            if now.saturating_sub(started) < self.start_delay {
                self.pending_start = true;
                return false;
            }
        }
        self.pending_start = false;
        self.delay_started = None;

        if let Some(source) = self.source.take() {
            self.device.dispose_source(source);
        }

        let buffer = self.effect.as_ref().map(|effect| effect.buffer);
        let Some(source) = self.device.gen_source(buffer) else {
            warn!(
                wave = self.effect.as_ref().map(|effect| effect.name()),
                "Backend is out of voices, dropping playback"
            );
            return false;
        };
        self.source = Some(source);

        if let Some(settings) = self.filter_settings {
            if self.filter.is_none() {
                self.filter = self.device.gen_filter();
            }
            if let Some(filter) = self.filter {
                self.device.backend().apply_filter(
                    filter,
                    settings.kind,
                    settings.frequency,
                    settings.q_factor,
                );
            }
        }

        let backend = self.device.backend();
        backend.set_source_looped(source, self.looped);
        backend.set_source_pan(source, self.pan);
        if let Some(position) = self.position {
            backend.set_source_position(source, position);
        }
        backend.set_source_reverb(source, self.reverb);
        backend.set_source_filter(source, self.filter);
        self.push_volume();
        self.push_pitch();
        backend.play_source(source);
        true
    }

    pub fn pause(&mut self) {
        if let Some(source) = self.source {
            if self.state() == SourceState::Playing {
                self.device.backend().pause_source(source);
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(source) = self.source {
            if self.state() == SourceState::Paused {
                self.device.backend().resume_source(source);
            }
        }
    }

    /// Stops the voice and releases its backend source. Cancels a pending start.
    pub fn stop(&mut self) {
        self.pending_start = false;
        self.delay_started = None;
        if let Some(source) = self.source.take() {
            self.device.dispose_source(source);
        }
    }

    fn push_volume(&self) {
        if let Some(source) = self.source {
            self.device
                .backend()
                .set_source_volume(source, self.volume * self.device.master_volume());
        }
    }

    fn push_pitch(&self) {
        if let Some(source) = self.source {
            self.device
                .backend()
                .set_source_pitch(source, self.pitch, self.clamp_pitch);
        }
    }
}

impl Drop for SoundEffectInstance {
    fn drop(&mut self) {
        if let Some(source) = self.source.take() {
            self.device.dispose_source(source);
        }
        if let Some(filter) = self.filter.take() {
            self.device.delete_filter(filter);
        }
    }
}
