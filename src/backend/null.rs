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
use std::collections::{HashMap, VecDeque};
use std::fmt;

use glam::Vec3;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{
    Backend, BackendError, BufferData, BufferDesc, BufferHandle, FilterHandle, FilterKind,
    ReverbHandle, ReverbProperty, SourceHandle, SourceState,
};

/// The name reported by the null device.
pub const NULL_DEVICE_NAME: &str = "Null Device";

/// Snapshot of a source as the null device sees it.
#[derive(Clone, Debug, Default)]
pub struct SourceRecord {
    pub buffer: Option<BufferHandle>,
    pub state: SourceState,
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub looped: bool,
    pub position: Option<Vec3>,
    pub reverb: Option<ReverbHandle>,
    pub filter: Option<FilterHandle>,
    pub queued: VecDeque<BufferHandle>,
    pub processed: VecDeque<BufferHandle>,
}

/// Snapshot of a reverb effect.
#[derive(Clone, Debug)]
pub struct ReverbRecord {
    pub parameters: [f32; 22],
    pub changes: Vec<(ReverbProperty, f32)>,
    pub commits: usize,
}

/// Snapshot of a filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterRecord {
    pub kind: Option<FilterKind>,
    pub frequency: f32,
    pub q_factor: f32,
}

#[derive(Default)]
struct NullState {
    next_id: u32,
    buffers: HashMap<BufferHandle, usize>,
    sources: HashMap<SourceHandle, SourceRecord>,
    reverbs: HashMap<ReverbHandle, ReverbRecord>,
    filters: HashMap<FilterHandle, FilterRecord>,
    opened: Option<String>,
}

impl NullState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// A backend that plays nothing but keeps full bookkeeping for every handle.
///
/// Used for headless operation and as the mixer in tests. Sources never finish on
/// their own; call [`NullBackend::finish_source`] or [`NullBackend::process_buffers`]
/// to emulate the mixer reaching the end of the data.
pub struct NullBackend {
    state: Mutex<NullState>,
    /// Maximum number of live sources, emulating a fixed voice pool.
    max_sources: Option<usize>,
}

impl NullBackend {
    /// Creates a null device with an unlimited voice pool.
    pub fn new() -> NullBackend {
        NullBackend {
            state: Mutex::new(NullState::default()),
            max_sources: None,
        }
    }

    /// Creates a null device that refuses to create more than `max_sources` sources.
    pub fn with_voice_limit(max_sources: usize) -> NullBackend {
        NullBackend {
            state: Mutex::new(NullState::default()),
            max_sources: Some(max_sources),
        }
    }

    /// Returns a snapshot of the given source.
    pub fn source(&self, source: SourceHandle) -> Option<SourceRecord> {
        self.state.lock().sources.get(&source).cloned()
    }

    /// Returns a snapshot of every live source.
    pub fn sources(&self) -> Vec<(SourceHandle, SourceRecord)> {
        self.state
            .lock()
            .sources
            .iter()
            .map(|(handle, record)| (*handle, record.clone()))
            .collect()
    }

    /// Number of live sources.
    pub fn live_sources(&self) -> usize {
        self.state.lock().sources.len()
    }

    /// Number of live sources currently playing.
    pub fn playing_sources(&self) -> usize {
        self.state
            .lock()
            .sources
            .values()
            .filter(|record| record.state == SourceState::Playing)
            .count()
    }

    /// Number of live buffers.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Size in bytes of the data last uploaded to a buffer.
    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.state.lock().buffers.get(&buffer).copied()
    }

    /// Returns a snapshot of the given reverb.
    pub fn reverb(&self, reverb: ReverbHandle) -> Option<ReverbRecord> {
        self.state.lock().reverbs.get(&reverb).cloned()
    }

    /// Number of live reverbs.
    pub fn live_reverbs(&self) -> usize {
        self.state.lock().reverbs.len()
    }

    /// Returns a snapshot of the given filter.
    pub fn filter(&self, filter: FilterHandle) -> Option<FilterRecord> {
        self.state.lock().filters.get(&filter).copied()
    }

    /// Number of live filters.
    pub fn live_filters(&self) -> usize {
        self.state.lock().filters.len()
    }

    /// The device opened by the registry, if any.
    pub fn opened_device(&self) -> Option<String> {
        self.state.lock().opened.clone()
    }

    /// Emulates a source reaching the end of its data.
    pub fn finish_source(&self, source: SourceHandle) {
        let mut state = self.state.lock();
        if let Some(record) = state.sources.get_mut(&source) {
            record.state = SourceState::Stopped;
            while let Some(buffer) = record.queued.pop_front() {
                record.processed.push_back(buffer);
            }
        }
    }

    /// Emulates the mixer consuming up to `count` queued buffers of a streaming source.
    /// The source stops once its queue runs dry.
    pub fn process_buffers(&self, source: SourceHandle, count: usize) {
        let mut state = self.state.lock();
        if let Some(record) = state.sources.get_mut(&source) {
            for _ in 0..count {
                match record.queued.pop_front() {
                    Some(buffer) => record.processed.push_back(buffer),
                    None => break,
                }
            }
            if record.queued.is_empty() && record.state == SourceState::Playing {
                record.state = SourceState::Stopped;
            }
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NullBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Null)", NULL_DEVICE_NAME)
    }
}

impl Backend for NullBackend {
    fn devices(&self) -> Vec<String> {
        vec![NULL_DEVICE_NAME.to_string()]
    }

    fn open_device(&self, name: Option<&str>) -> Result<(), BackendError> {
        let name = name.unwrap_or(NULL_DEVICE_NAME);
        if name != NULL_DEVICE_NAME {
            return Err(BackendError::DeviceNotFound(name.to_string()));
        }
        self.state.lock().opened = Some(name.to_string());
        info!(device = name, "Opened null audio device");
        Ok(())
    }

    fn update(&self) {}

    fn close(&self) {
        let mut state = self.state.lock();
        debug!(
            sources = state.sources.len(),
            buffers = state.buffers.len(),
            "Closing null audio device"
        );
        *state = NullState::default();
    }

    fn gen_buffer(&self) -> Option<BufferHandle> {
        let mut state = self.state.lock();
        let handle = BufferHandle::new(state.next());
        state.buffers.insert(handle, 0);
        Some(handle)
    }

    fn gen_buffer_with(&self, desc: &BufferDesc<'_>) -> Option<BufferHandle> {
        let mut state = self.state.lock();
        let handle = BufferHandle::new(state.next());
        state.buffers.insert(handle, desc.data.byte_len());
        Some(handle)
    }

    fn set_buffer_data(&self, buffer: BufferHandle, data: BufferData<'_>, _: u32, _: u16) {
        if let Some(len) = self.state.lock().buffers.get_mut(&buffer) {
            *len = data.byte_len();
        }
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn gen_source(&self, buffer: Option<BufferHandle>) -> Option<SourceHandle> {
        let mut state = self.state.lock();
        if self
            .max_sources
            .is_some_and(|max| state.sources.len() >= max)
        {
            return None;
        }
        let handle = SourceHandle::new(state.next());
        state.sources.insert(
            handle,
            SourceRecord {
                buffer,
                volume: 1.0,
                ..Default::default()
            },
        );
        Some(handle)
    }

    fn stop_and_dispose_source(&self, source: SourceHandle) {
        self.state.lock().sources.remove(&source);
    }

    fn play_source(&self, source: SourceHandle) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.state = SourceState::Playing;
        }
    }

    fn pause_source(&self, source: SourceHandle) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            if record.state == SourceState::Playing {
                record.state = SourceState::Paused;
            }
        }
    }

    fn resume_source(&self, source: SourceHandle) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            if record.state == SourceState::Paused {
                record.state = SourceState::Playing;
            }
        }
    }

    fn source_state(&self, source: SourceHandle) -> SourceState {
        self.state
            .lock()
            .sources
            .get(&source)
            .map(|record| record.state)
            .unwrap_or_default()
    }

    fn set_source_volume(&self, source: SourceHandle, volume: f32) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.volume = volume;
        }
    }

    fn set_source_looped(&self, source: SourceHandle, looped: bool) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.looped = looped;
        }
    }

    fn set_source_pan(&self, source: SourceHandle, pan: f32) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.pan = pan;
        }
    }

    fn set_source_position(&self, source: SourceHandle, position: Vec3) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.position = Some(position);
        }
    }

    fn set_source_pitch(&self, source: SourceHandle, pitch: f32, clamp: bool) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.pitch = if clamp { pitch.clamp(-1.0, 1.0) } else { pitch };
        }
    }

    fn set_source_reverb(&self, source: SourceHandle, reverb: Option<ReverbHandle>) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.reverb = reverb;
        }
    }

    fn set_source_filter(&self, source: SourceHandle, filter: Option<FilterHandle>) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.filter = filter;
        }
    }

    fn queue_source_buffer(&self, source: SourceHandle, buffer: BufferHandle) {
        if let Some(record) = self.state.lock().sources.get_mut(&source) {
            record.queued.push_back(buffer);
        }
    }

    fn dequeue_processed_buffers(&self, source: SourceHandle) -> Vec<BufferHandle> {
        self.state
            .lock()
            .sources
            .get_mut(&source)
            .map(|record| record.processed.drain(..).collect())
            .unwrap_or_default()
    }

    fn processed_buffer_count(&self, source: SourceHandle) -> usize {
        self.state
            .lock()
            .sources
            .get(&source)
            .map(|record| record.processed.len())
            .unwrap_or(0)
    }

    fn gen_reverb(&self, parameters: &[f32; 22]) -> Option<ReverbHandle> {
        let mut state = self.state.lock();
        let handle = ReverbHandle::new(state.next());
        state.reverbs.insert(
            handle,
            ReverbRecord {
                parameters: *parameters,
                changes: Vec::new(),
                commits: 0,
            },
        );
        Some(handle)
    }

    fn set_reverb_property(&self, reverb: ReverbHandle, property: ReverbProperty, value: f32) {
        if let Some(record) = self.state.lock().reverbs.get_mut(&reverb) {
            record.changes.push((property, value));
        }
    }

    fn commit_reverb_changes(&self, reverb: ReverbHandle) {
        if let Some(record) = self.state.lock().reverbs.get_mut(&reverb) {
            record.commits += 1;
        }
    }

    fn delete_reverb(&self, reverb: ReverbHandle) {
        self.state.lock().reverbs.remove(&reverb);
    }

    fn gen_filter(&self) -> Option<FilterHandle> {
        let mut state = self.state.lock();
        let handle = FilterHandle::new(state.next());
        state.filters.insert(handle, FilterRecord::default());
        Some(handle)
    }

    fn apply_filter(&self, filter: FilterHandle, kind: FilterKind, frequency: f32, q_factor: f32) {
        if let Some(record) = self.state.lock().filters.get_mut(&filter) {
            *record = FilterRecord {
                kind: Some(kind),
                frequency,
                q_factor,
            };
        }
    }

    fn delete_filter(&self, filter: FilterHandle) {
        self.state.lock().filters.remove(&filter);
    }
}
