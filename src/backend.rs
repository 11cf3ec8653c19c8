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

//! The mixer capability interface.
//!
//! The runtime never mixes audio itself. Everything it needs from the underlying
//! mixer (buffers, sources, reverb and filter effects) goes through [`Backend`].
//! Each kind of handle is its own newtype so a source can never be passed where a
//! buffer is expected.

use std::fmt;

use glam::Vec3;

pub mod null;

/// Errors raised by a backend while opening or enumerating devices.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw backend identifier.
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Returns the raw backend identifier.
            pub fn raw(&self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A backend buffer holding PCM data.
    BufferHandle
);
handle!(
    /// A backend voice.
    SourceHandle
);
handle!(
    /// A backend reverb effect (effect and its send slot).
    ReverbHandle
);
handle!(
    /// A backend filter.
    FilterHandle
);

/// Playback state reported by the backend for a source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Sample payload uploaded into a buffer.
#[derive(Clone, Copy, Debug)]
pub enum BufferData<'a> {
    /// Interleaved PCM bytes (8 or 16 bit, or ADPCM blocks).
    Bytes(&'a [u8]),
    /// Interleaved 32 bit float samples.
    Float(&'a [f32]),
}

impl BufferData<'_> {
    /// Size of the payload in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            BufferData::Bytes(bytes) => bytes.len(),
            BufferData::Float(samples) => samples.len() * std::mem::size_of::<f32>(),
        }
    }
}

/// Everything needed to create a static buffer in one call.
#[derive(Clone, Copy, Debug)]
pub struct BufferDesc<'a> {
    pub data: BufferData<'a>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Loop region start, in sample frames.
    pub loop_start: u32,
    /// Loop region length, in sample frames. Zero means the whole buffer.
    pub loop_length: u32,
    pub is_adpcm: bool,
    /// Format specific parameter (bits per sample, or ADPCM block alignment).
    pub format_parameter: u32,
}

/// The reverb properties a backend can be asked to change.
///
/// These mirror the per-field reverb setters of the mixer. Not every authored DSP
/// parameter has a counterpart here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReverbProperty {
    ReflectionsDelay,
    ReverbDelay,
    EarlyDiffusion,
    LateDiffusion,
    LowEqGain,
    LowEqCutoff,
    HighEqGain,
    HighEqCutoff,
    RoomFilterFrequency,
    RoomFilterMain,
    RoomFilterHighFrequency,
    ReflectionsGain,
    ReverbGain,
    DecayTime,
    Density,
    RoomSize,
    WetDryMix,
}

/// Filter shapes supported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    LowPass,
    HighPass,
    BandPass,
}

/// The capability surface consumed by the runtime.
///
/// Generation calls return `None` when the mixer is out of resources. Callers treat
/// that as a soft failure: the affected voice is skipped, never the whole cue.
pub trait Backend: fmt::Display + Send + Sync {
    /// Lists the names of the output devices this backend can open.
    fn devices(&self) -> Vec<String>;

    /// Opens the named device, or the default device when `name` is `None`.
    fn open_device(&self, name: Option<&str>) -> Result<(), BackendError>;

    /// Per-frame housekeeping for the device.
    fn update(&self);

    /// Releases the device. No handle may be used afterwards.
    fn close(&self);

    // Buffers.
    fn gen_buffer(&self) -> Option<BufferHandle>;
    fn gen_buffer_with(&self, desc: &BufferDesc<'_>) -> Option<BufferHandle>;
    fn set_buffer_data(
        &self,
        buffer: BufferHandle,
        data: BufferData<'_>,
        sample_rate: u32,
        channels: u16,
    );
    fn delete_buffer(&self, buffer: BufferHandle);

    // Sources.
    fn gen_source(&self, buffer: Option<BufferHandle>) -> Option<SourceHandle>;
    fn stop_and_dispose_source(&self, source: SourceHandle);
    fn play_source(&self, source: SourceHandle);
    fn pause_source(&self, source: SourceHandle);
    fn resume_source(&self, source: SourceHandle);
    fn source_state(&self, source: SourceHandle) -> SourceState;
    fn set_source_volume(&self, source: SourceHandle, volume: f32);
    fn set_source_looped(&self, source: SourceHandle, looped: bool);
    fn set_source_pan(&self, source: SourceHandle, pan: f32);
    fn set_source_position(&self, source: SourceHandle, position: Vec3);
    /// Sets pitch in octaves. When `clamp` is set the backend limits it to [-1, 1].
    fn set_source_pitch(&self, source: SourceHandle, pitch: f32, clamp: bool);
    fn set_source_reverb(&self, source: SourceHandle, reverb: Option<ReverbHandle>);
    fn set_source_filter(&self, source: SourceHandle, filter: Option<FilterHandle>);
    fn queue_source_buffer(&self, source: SourceHandle, buffer: BufferHandle);
    /// Unqueues and returns every buffer the source has finished playing.
    fn dequeue_processed_buffers(&self, source: SourceHandle) -> Vec<BufferHandle>;
    fn processed_buffer_count(&self, source: SourceHandle) -> usize;

    // Reverb.
    /// Creates a reverb from the 22 authored DSP values, in fixed parameter order.
    fn gen_reverb(&self, parameters: &[f32; 22]) -> Option<ReverbHandle>;
    fn set_reverb_property(&self, reverb: ReverbHandle, property: ReverbProperty, value: f32);
    fn commit_reverb_changes(&self, reverb: ReverbHandle);
    fn delete_reverb(&self, reverb: ReverbHandle);

    // Filters.
    fn gen_filter(&self) -> Option<FilterHandle>;
    fn apply_filter(&self, filter: FilterHandle, kind: FilterKind, frequency: f32, q_factor: f32);
    fn delete_filter(&self, filter: FilterHandle);
}
