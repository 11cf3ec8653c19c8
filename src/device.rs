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

//! The device registry.
//!
//! An [`AudioDevice`] owns the backend handle for the lifetime of a runtime, keeps
//! the pools of playback instances nobody else owns, and runs the per-frame sweep
//! that reaps finished voices and keeps streaming voices fed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use crate::backend::{
    Backend, BufferData, BufferDesc, BufferHandle, FilterHandle, ReverbHandle, SourceHandle,
};
use crate::instance::dynamic::DynamicSoundEffectInstance;
use crate::instance::SoundEffectInstance;

pub mod clock;
pub mod dispatch;

use self::clock::Clock;
use self::dispatch::MainThreadDispatcher;

pub struct AudioDevice {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    dispatcher: MainThreadDispatcher,
    /// Multiplied into every source gain at dispatch.
    master_volume: RwLock<f32>,
    /// Fire-and-forget instances, reaped once they stop.
    instances: Mutex<Vec<SoundEffectInstance>>,
    /// Streaming instances that are playing or paused.
    streams: Mutex<Vec<Arc<DynamicSoundEffectInstance>>>,
}

impl AudioDevice {
    /// Creates a device registry. The calling thread becomes the main thread.
    pub fn new(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Arc<AudioDevice> {
        Arc::new(AudioDevice {
            backend,
            clock,
            dispatcher: MainThreadDispatcher::new(),
            master_volume: RwLock::new(1.0),
            instances: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
        })
    }

    /// The backend this device dispatches to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Current time on the device clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn master_volume(&self) -> f32 {
        *self.master_volume.read()
    }

    /// Sets the master volume. Takes effect the next time a voice pushes its gain.
    pub fn set_master_volume(&self, volume: f32) {
        *self.master_volume.write() = volume.max(0.0);
    }

    /// Returns true when called from the thread that created the device.
    pub fn is_main_thread(&self) -> bool {
        self.dispatcher.is_main_thread()
    }

    /// Number of fire-and-forget instances still alive.
    pub fn active_instances(&self) -> usize {
        self.instances.lock().len()
    }

    /// Number of streaming instances being serviced.
    pub fn active_streams(&self) -> usize {
        self.streams.lock().len()
    }

    /// Runs one frame of device housekeeping.
    pub fn update(&self) {
        self.dispatcher.pump();

        let reaped = {
            let mut instances = self.dispatcher.lock(&self.instances);
            let before = instances.len();
            instances.retain(|instance| !instance.is_finished());
            before - instances.len()
        };
        if reaped > 0 {
            debug!(reaped, "Reaped finished sound effect instances");
        }

        self.dispatcher
            .lock(&self.streams)
            .retain(|stream| stream.update());

        self.backend.update();
    }

    /// Releases every pooled instance and closes the backend.
    pub fn shutdown(&self) {
        self.dispatcher.close();
        let instances = std::mem::take(&mut *self.instances.lock());
        let streams = std::mem::take(&mut *self.streams.lock());
        info!(
            instances = instances.len(),
            streams = streams.len(),
            "Shutting down audio device"
        );
        drop(instances);
        for stream in streams {
            stream.stop();
        }
        self.backend.close();
    }

    pub(crate) fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        self.dispatcher.lock(mutex)
    }

    pub(crate) fn track_instance(&self, instance: SoundEffectInstance) {
        self.dispatcher.lock(&self.instances).push(instance);
    }

    pub(crate) fn track_stream(&self, stream: Arc<DynamicSoundEffectInstance>) {
        let mut streams = self.dispatcher.lock(&self.streams);
        if !streams.iter().any(|tracked| Arc::ptr_eq(tracked, &stream)) {
            streams.push(stream);
        }
    }

    pub(crate) fn gen_buffer(&self) -> Option<BufferHandle> {
        let backend = self.backend.clone();
        self.dispatcher.run(move || backend.gen_buffer()).flatten()
    }

    pub(crate) fn gen_buffer_with(&self, desc: &BufferDesc<'_>) -> Option<BufferHandle> {
        if self.dispatcher.is_main_thread() {
            return self.backend.gen_buffer_with(desc);
        }

        // The payload has to outlive the hand-off.
        let backend = self.backend.clone();
        let owned = OwnedBufferDesc::from(desc);
        self.dispatcher
            .run(move || backend.gen_buffer_with(&owned.as_desc()))
            .flatten()
    }

    pub(crate) fn delete_buffer(&self, buffer: BufferHandle) {
        let backend = self.backend.clone();
        self.dispatcher.run(move || backend.delete_buffer(buffer));
    }

    pub(crate) fn gen_source(&self, buffer: Option<BufferHandle>) -> Option<SourceHandle> {
        let backend = self.backend.clone();
        self.dispatcher
            .run(move || backend.gen_source(buffer))
            .flatten()
    }

    pub(crate) fn dispose_source(&self, source: SourceHandle) {
        let backend = self.backend.clone();
        self.dispatcher
            .run(move || backend.stop_and_dispose_source(source));
    }

    pub(crate) fn gen_reverb(&self, parameters: [f32; 22]) -> Option<ReverbHandle> {
        let backend = self.backend.clone();
        self.dispatcher
            .run(move || backend.gen_reverb(&parameters))
            .flatten()
    }

    pub(crate) fn delete_reverb(&self, reverb: ReverbHandle) {
        let backend = self.backend.clone();
        self.dispatcher.run(move || backend.delete_reverb(reverb));
    }

    pub(crate) fn gen_filter(&self) -> Option<FilterHandle> {
        let backend = self.backend.clone();
        self.dispatcher.run(move || backend.gen_filter()).flatten()
    }

    pub(crate) fn delete_filter(&self, filter: FilterHandle) {
        let backend = self.backend.clone();
        self.dispatcher.run(move || backend.delete_filter(filter));
    }
}

impl fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDevice")
            .field("backend", &self.backend.to_string())
            .field("master_volume", &self.master_volume())
            .field("instances", &self.active_instances())
            .field("streams", &self.active_streams())
            .finish()
    }
}

enum OwnedBufferData {
    Bytes(Vec<u8>),
    Float(Vec<f32>),
}

struct OwnedBufferDesc {
    data: OwnedBufferData,
    sample_rate: u32,
    channels: u16,
    loop_start: u32,
    loop_length: u32,
    is_adpcm: bool,
    format_parameter: u32,
}

impl OwnedBufferDesc {
    fn as_desc(&self) -> BufferDesc<'_> {
        BufferDesc {
            data: match &self.data {
                OwnedBufferData::Bytes(bytes) => BufferData::Bytes(bytes),
                OwnedBufferData::Float(samples) => BufferData::Float(samples),
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

impl From<&BufferDesc<'_>> for OwnedBufferDesc {
    fn from(desc: &BufferDesc<'_>) -> Self {
        OwnedBufferDesc {
            data: match desc.data {
                BufferData::Bytes(bytes) => OwnedBufferData::Bytes(bytes.to_vec()),
                BufferData::Float(samples) => OwnedBufferData::Float(samples.to_vec()),
            },
            sample_rate: desc.sample_rate,
            channels: desc.channels,
            loop_start: desc.loop_start,
            loop_length: desc.loop_length,
            is_adpcm: desc.is_adpcm,
            format_parameter: desc.format_parameter,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::backend::null::NullBackend;
    use crate::device::clock::ManualClock;

    fn device() -> (Arc<AudioDevice>, Arc<NullBackend>) {
        let backend = Arc::new(NullBackend::new());
        let device = AudioDevice::new(backend.clone(), Arc::new(ManualClock::new()));
        (device, backend)
    }

    #[test]
    fn test_master_volume_never_negative() {
        let (device, _) = device();
        device.set_master_volume(-1.0);
        assert_eq!(device.master_volume(), 0.0);
        device.set_master_volume(0.5);
        assert_eq!(device.master_volume(), 0.5);
    }

    #[test]
    fn test_off_thread_generation_is_routed_to_main() {
        let (device, backend) = device();

        let join = {
            let device = device.clone();
            thread::spawn(move || {
                let samples = vec![0.0f32; 64];
                device.gen_buffer_with(&BufferDesc {
                    data: BufferData::Float(&samples),
                    sample_rate: 44100,
                    channels: 1,
                    loop_start: 0,
                    loop_length: 0,
                    is_adpcm: false,
                    format_parameter: 32,
                })
            })
        };

        while !join.is_finished() {
            device.update();
            thread::yield_now();
        }
        let buffer = join.join().unwrap().expect("buffer should be generated");
        assert_eq!(backend.buffer_len(buffer), Some(64 * 4));
    }

    #[test]
    fn test_shutdown_closes_backend() {
        let (device, backend) = device();
        backend.open_device(None).unwrap();
        assert!(device.gen_source(None).is_some());
        device.shutdown();
        assert_eq!(backend.live_sources(), 0);
        assert_eq!(backend.opened_device(), None);
    }
}
