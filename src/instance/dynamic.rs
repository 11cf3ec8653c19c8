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

//! Streaming voices.
//!
//! A [`DynamicSoundEffectInstance`] plays whatever the caller submits, one buffer at
//! a time. Buffers cycle through three rings: `to_queue` (submitted while not
//! playing), `queued` (handed to the backend) and `available` (played out and ready
//! for reuse). Subscribers are told when the number of pending buffers gets low.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::backend::{BufferData, BufferHandle, SourceHandle, SourceState};
use crate::device::AudioDevice;

/// Subscribers are notified when this many buffers or fewer are pending.
pub const MINIMUM_BUFFER_CHECK: usize = 2;

/// Sent to subscribers when a stream is running low on data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferNeeded {
    /// Buffers submitted but not yet played out.
    pub pending: usize,
}

struct StreamState {
    source: Option<SourceHandle>,
    status: SourceState,
    volume: f32,
    pitch: f32,
    pan: f32,
    queued: VecDeque<BufferHandle>,
    to_queue: VecDeque<BufferHandle>,
    available: VecDeque<BufferHandle>,
    pending: usize,
}

impl StreamState {
    fn needs_buffers(&self) -> bool {
        self.pending <= MINIMUM_BUFFER_CHECK
    }
}

pub struct DynamicSoundEffectInstance {
    device: Arc<AudioDevice>,
    sample_rate: u32,
    channels: u16,
    state: Mutex<StreamState>,
    subscribers: Mutex<Vec<Sender<BufferNeeded>>>,
}

impl DynamicSoundEffectInstance {
    pub fn new(
        device: Arc<AudioDevice>,
        sample_rate: u32,
        channels: u16,
    ) -> Arc<DynamicSoundEffectInstance> {
        Arc::new(DynamicSoundEffectInstance {
            device,
            sample_rate,
            channels,
            state: Mutex::new(StreamState {
                source: None,
                status: SourceState::Stopped,
                volume: 1.0,
                pitch: 0.0,
                pan: 0.0,
                queued: VecDeque::new(),
                to_queue: VecDeque::new(),
                available: VecDeque::new(),
                pending: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Returns a channel that receives a [`BufferNeeded`] whenever the stream runs low.
    pub fn subscribe(&self) -> Receiver<BufferNeeded> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn state(&self) -> SourceState {
        self.lock().status
    }

    /// Buffers submitted but not yet played out.
    pub fn pending_buffer_count(&self) -> usize {
        self.lock().pending
    }

    /// Sizes of the queued, to-queue and available rings.
    pub fn ring_sizes(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (state.queued.len(), state.to_queue.len(), state.available.len())
    }

    pub fn set_volume(&self, volume: f32) {
        let mut state = self.lock();
        state.volume = volume.max(0.0);
        if let Some(source) = state.source {
            self.device
                .backend()
                .set_source_volume(source, state.volume * self.device.master_volume());
        }
    }

    pub fn set_pitch(&self, pitch: f32) {
        let mut state = self.lock();
        state.pitch = pitch.clamp(-1.0, 1.0);
        if let Some(source) = state.source {
            self.device.backend().set_source_pitch(source, state.pitch, true);
        }
    }

    pub fn set_pan(&self, pan: f32) {
        let mut state = self.lock();
        state.pan = pan.clamp(-1.0, 1.0);
        if let Some(source) = state.source {
            self.device.backend().set_source_pan(source, state.pan);
        }
    }

    /// Uploads a block of samples. Returns false if no buffer could be obtained.
    ///
    /// Data submitted while the stream has a live source is queued immediately;
    /// otherwise it waits for the next [`DynamicSoundEffectInstance::play`].
    pub fn submit_buffer(&self, data: BufferData<'_>) -> bool {
        let recycled = self.lock().available.pop_front();
        let buffer = match recycled {
            Some(buffer) => buffer,
            None => match self.device.gen_buffer() {
                Some(buffer) => buffer,
                None => {
                    warn!("Unable to generate a streaming buffer, dropping submitted data");
                    return false;
                }
            },
        };
        self.device
            .backend()
            .set_buffer_data(buffer, data, self.sample_rate, self.channels);

        let mut state = self.lock();
        match (state.status, state.source) {
            (SourceState::Playing | SourceState::Paused, Some(source)) => {
                self.device.backend().queue_source_buffer(source, buffer);
                state.queued.push_back(buffer);
            }
            _ => state.to_queue.push_back(buffer),
        }
        state.pending += 1;
        true
    }

    /// Starts streaming and registers the stream with the device for servicing.
    pub fn play(self: &Arc<Self>) {
        let stale = {
            let mut state = self.lock();
            match state.status {
                SourceState::Playing => return,
                SourceState::Paused => {
                    drop(state);
                    self.resume();
                    return;
                }
                SourceState::Stopped => {}
            }
            Self::recycle_queued(&mut state);
            state.source.take()
        };
        if let Some(source) = stale {
            self.device.dispose_source(source);
        }

        let Some(source) = self.device.gen_source(None) else {
            warn!("Backend is out of voices, stream not started");
            return;
        };

        let notify = {
            let mut state = self.lock();
            if state.status != SourceState::Stopped || state.source.is_some() {
                // Started by another caller in the meantime.
                drop(state);
                self.device.dispose_source(source);
                return;
            }
            state.source = Some(source);

            let backend = self.device.backend();
            backend.set_source_volume(source, state.volume * self.device.master_volume());
            backend.set_source_pitch(source, state.pitch, true);
            backend.set_source_pan(source, state.pan);
            while let Some(buffer) = state.to_queue.pop_front() {
                backend.queue_source_buffer(source, buffer);
                state.queued.push_back(buffer);
            }
            backend.play_source(source);
            state.status = SourceState::Playing;
            debug!(pending = state.pending, "Stream started");

            state.needs_buffers().then_some(state.pending)
        };

        self.device.track_stream(self.clone());
        if let Some(pending) = notify {
            self.notify(pending);
        }
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        if state.status != SourceState::Playing {
            return;
        }
        if let Some(source) = state.source {
            self.device.backend().pause_source(source);
        }
        state.status = SourceState::Paused;
    }

    pub fn resume(&self) {
        let mut state = self.lock();
        if state.status != SourceState::Paused {
            return;
        }
        if let Some(source) = state.source {
            self.device.backend().resume_source(source);
        }
        state.status = SourceState::Playing;
    }

    /// Stops streaming. Buffers that were handed to the backend return to the
    /// available ring; buffers submitted while stopped stay pending.
    pub fn stop(&self) {
        let source = {
            let mut state = self.lock();
            Self::recycle_queued(&mut state);
            state.status = SourceState::Stopped;
            state.source.take()
        };
        if let Some(source) = source {
            self.device.dispose_source(source);
        }
    }

    /// Services the stream for one tick. Returns false once the stream has been
    /// stopped and no longer needs servicing.
    pub fn update(&self) -> bool {
        let notify = {
            let mut state = self.lock();
            if state.status == SourceState::Stopped {
                return false;
            }
            let Some(source) = state.source else {
                return false;
            };

            let backend = self.device.backend();
            let processed = backend.dequeue_processed_buffers(source);
            for buffer in &processed {
                if let Some(index) = state.queued.iter().position(|queued| queued == buffer) {
                    state.queued.remove(index);
                    state.available.push_back(*buffer);
                    state.pending -= 1;
                }
            }

            // A starved source stops on its own; restart it once data is back.
            if state.status == SourceState::Playing
                && !state.queued.is_empty()
                && backend.source_state(source) == SourceState::Stopped
            {
                debug!(pending = state.pending, "Restarting starved stream");
                backend.play_source(source);
            }

            (!processed.is_empty() && state.needs_buffers()).then_some(state.pending)
        };

        if let Some(pending) = notify {
            self.notify(pending);
        }
        true
    }

    /// Stream state is only ever held for bookkeeping and direct backend calls,
    /// never across a main thread hand-off.
    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.device.lock(&self.state)
    }

    fn recycle_queued(state: &mut StreamState) {
        while let Some(buffer) = state.queued.pop_front() {
            state.available.push_back(buffer);
            state.pending -= 1;
        }
    }

    fn notify(&self, pending: usize) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(BufferNeeded { pending }).is_ok());
    }
}

impl fmt::Debug for DynamicSoundEffectInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("DynamicSoundEffectInstance")
            .field("status", &state.status)
            .field("pending", &state.pending)
            .field("queued", &state.queued.len())
            .field("to_queue", &state.to_queue.len())
            .field("available", &state.available.len())
            .finish()
    }
}

impl Drop for DynamicSoundEffectInstance {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(source) = state.source.take() {
            self.device.dispose_source(source);
        }
        for buffer in state
            .queued
            .drain(..)
            .chain(state.to_queue.drain(..))
            .chain(state.available.drain(..))
        {
            self.device.delete_buffer(buffer);
        }
    }
}
