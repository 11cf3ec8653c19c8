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

//! Audio categories.
//!
//! A category is a polyphony budget shared by every cue assigned to it. It owns the
//! list of active cues, decides what happens when a new cue arrives at the cap, and
//! drives the crossfade between a queued cue and the cue it replaces.
//!
//! Locking: the category lock is always taken before any cue lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::AudioDevice;

use super::cue::{Cue, CueInner, StopOptions};
use super::error::{AudioError, Result};
use super::snapshot::CategorySnapshot;
use super::variable::VOLUME;

/// Default polyphony of a category.
pub const DEFAULT_MAX_INSTANCES: usize = 255;

/// Name of the category cues fall into when none is authored.
pub const DEFAULT_CATEGORY: &str = "Default";

/// What to do when a cue arrives and the limit is already reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxInstanceBehavior {
    /// Refuse the new cue.
    #[default]
    Fail,
    /// Accept the new cue silent and crossfade it in over the oldest one.
    Queue,
    /// Stop the oldest active cue, preferring one with the same name as the new cue.
    ReplaceOldest,
    /// Stop the active cue with the lowest volume.
    ReplaceQuietest,
    /// Priorities are not tracked; behaves like `ReplaceOldest`.
    ReplaceLowestPriority,
}

/// Volume curve applied while a queued cue crossfades over an active one.
///
/// Only `Linear` is implemented. A category configured with any other curve
/// fails its update once a crossfade begins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeType {
    /// Volumes move in a straight line over the fade durations.
    #[default]
    Linear,
    /// Unsupported.
    Logarithmic,
    /// Unsupported.
    EqualPower,
}

/// Authored settings of a category.
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySettings {
    pub name: String,
    pub volume: f32,
    pub max_instances: usize,
    pub behavior: MaxInstanceBehavior,
    pub fade_in: Duration,
    pub fade_out: Duration,
    pub crossfade: CrossfadeType,
}

impl CategorySettings {
    pub fn new(name: &str) -> CategorySettings {
        CategorySettings {
            name: name.to_string(),
            volume: 1.0,
            max_instances: DEFAULT_MAX_INSTANCES,
            behavior: MaxInstanceBehavior::Fail,
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
            crossfade: CrossfadeType::Linear,
        }
    }
}

/// A running crossfade from `fading` to `queued`.
struct Crossfade {
    fading: Arc<Cue>,
    /// Volume of the fading cue when the fade began.
    fading_volume: f32,
    queued: Arc<Cue>,
    started: Duration,
}

pub(crate) struct CategoryState {
    volume: f32,
    paused: bool,
    /// Active cues, oldest first.
    active: Vec<Arc<Cue>>,
    counts: HashMap<String, usize>,
    fade: Option<Crossfade>,
}

impl CategoryState {
    /// Number of active cues named `name`.
    pub(crate) fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// The oldest active cue, optionally restricted to a name.
    pub(crate) fn oldest(&self, name: Option<&str>) -> Option<Arc<Cue>> {
        self.active
            .iter()
            .find(|cue| name.is_none_or(|name| cue.name() == name))
            .cloned()
    }
}

pub struct AudioCategory {
    settings: CategorySettings,
    device: Arc<AudioDevice>,
    state: Mutex<CategoryState>,
}

impl AudioCategory {
    pub fn new(device: Arc<AudioDevice>, settings: CategorySettings) -> Arc<AudioCategory> {
        Arc::new(AudioCategory {
            state: Mutex::new(CategoryState {
                volume: settings.volume.max(0.0),
                paused: false,
                active: Vec::new(),
                counts: HashMap::new(),
                fade: None,
            }),
            settings,
            device,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &CategorySettings {
        &self.settings
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn is_fading(&self) -> bool {
        self.lock().fade.is_some()
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Number of active cues named `name`.
    pub fn instance_count(&self, name: &str) -> usize {
        self.lock().count(name)
    }

    /// The active cues, oldest first.
    pub fn active_cues(&self) -> Vec<Arc<Cue>> {
        self.lock().active.clone()
    }

    /// Sets the category volume and applies it to every active cue that is not
    /// part of a crossfade.
    pub fn set_volume(&self, volume: f32) {
        let mut state = self.lock();
        state.volume = volume.max(0.0);
        for cue in &state.active {
            let fading = state.fade.as_ref().is_some_and(|fade| {
                Arc::ptr_eq(&fade.fading, cue) || Arc::ptr_eq(&fade.queued, cue)
            });
            if !fading {
                cue.set_volume_variable(state.volume);
            }
        }
    }

    pub fn pause(&self) {
        let mut state = self.lock();
        state.paused = true;
        for cue in &state.active {
            cue.pause();
        }
    }

    pub fn resume(&self) {
        let mut state = self.lock();
        state.paused = false;
        for cue in &state.active {
            cue.resume();
        }
    }

    /// Stops every active cue.
    pub fn stop(&self, options: StopOptions) {
        let mut state = self.lock();
        state.fade = None;
        state.counts.clear();
        let stopped = std::mem::take(&mut state.active);
        if !stopped.is_empty() {
            debug!(category = self.name(), cues = stopped.len(), "Stopping category");
        }
        for cue in stopped {
            cue.halt(options);
        }
    }

    /// Advances the crossfade, updates every active cue and drops the ones that
    /// finished, then refreshes each cue's instance count.
    pub fn update(&self) -> Result<()> {
        let mut state = self.lock();

        let fade = state
            .fade
            .as_ref()
            .map(|fade| (fade.fading.clone(), fade.fading_volume, fade.queued.clone(), fade.started));
        if let Some((fading, fading_volume, queued, started)) = fade {
            if self.settings.crossfade != CrossfadeType::Linear {
                return Err(AudioError::UnsupportedCrossfade(self.settings.crossfade));
            }
            let elapsed = self.device.now().saturating_sub(started);
            let fade_out = progress(elapsed, self.settings.fade_out);
            let fade_in = progress(elapsed, self.settings.fade_in);

            if fade_out >= 1.0 && fade_in >= 1.0 {
                self.finish_crossfade(&mut state);
            } else {
                fading.set_volume_variable(fading_volume * (1.0 - fade_out.min(1.0)));
                queued.set_volume_variable(state.volume * fade_in.min(1.0));
            }
        }

        let mut index = 0;
        while index < state.active.len() {
            let cue = state.active[index].clone();
            if cue.update()? {
                index += 1;
            } else {
                self.remove_at(&mut state, index);
                debug!(category = self.name(), cue = cue.name(), "Cue finished");
            }
        }

        for cue in &state.active {
            cue.set_num_instances(state.count(cue.name()));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> CategorySnapshot {
        let state = self.lock();
        CategorySnapshot {
            name: self.name().to_string(),
            volume: state.volume,
            paused: state.paused,
            fading: state.fade.is_some(),
            cues: state.active.iter().map(|cue| cue.snapshot()).collect(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CategoryState> {
        self.device.lock(&self.state)
    }

    /// Appends a cue to the active list without checking the limit.
    pub(crate) fn push(&self, state: &mut CategoryState, cue: &Arc<Cue>) {
        state.active.push(cue.clone());
        *state.counts.entry(cue.name().to_string()).or_default() += 1;
    }

    /// Admits a cue, applying the category's limit behavior. `inner` is the
    /// incoming cue's locked state. Returns false if the cue was refused.
    pub(crate) fn admit(&self, state: &mut CategoryState, cue: &Arc<Cue>, inner: &mut CueInner) -> bool {
        if state.active.len() < self.settings.max_instances {
            self.push(state, cue);
            return true;
        }

        match self.settings.behavior {
            MaxInstanceBehavior::Fail => {
                debug!(
                    category = self.name(),
                    cue = cue.name(),
                    limit = self.settings.max_instances,
                    "Category full, cue refused"
                );
                return false;
            }
            MaxInstanceBehavior::Queue => {
                if let Some(oldest) = state.oldest(None) {
                    self.begin_crossfade(state, oldest, cue, inner);
                }
            }
            MaxInstanceBehavior::ReplaceOldest | MaxInstanceBehavior::ReplaceLowestPriority => {
                if !self.remove_oldest(state, Some(cue.name())) {
                    self.remove_oldest(state, None);
                }
            }
            MaxInstanceBehavior::ReplaceQuietest => {
                self.remove_quietest(state, None);
            }
        }
        self.push(state, cue);
        true
    }

    /// Starts crossfading from `fading` to `queued`. A crossfade already in
    /// progress is completed first.
    pub(crate) fn begin_crossfade(
        &self,
        state: &mut CategoryState,
        fading: Arc<Cue>,
        queued: &Arc<Cue>,
        queued_inner: &mut CueInner,
    ) {
        if state.fade.is_some() {
            self.finish_crossfade(state);
            // The cue that was meant to fade out may be gone now.
            if !state.active.iter().any(|cue| Arc::ptr_eq(cue, &fading)) {
                return;
            }
        }

        let fading_volume = fading.volume();
        queued_inner.set_internal(VOLUME, 0.0);
        debug!(
            category = self.name(),
            fading = fading.name(),
            queued = queued.name(),
            "Crossfade started"
        );
        state.fade = Some(Crossfade {
            fading,
            fading_volume,
            queued: queued.clone(),
            started: self.device.now(),
        });
    }

    /// Stops the oldest active cue, optionally restricted to a name.
    pub(crate) fn remove_oldest(&self, state: &mut CategoryState, name: Option<&str>) -> bool {
        let Some(index) = state
            .active
            .iter()
            .position(|cue| name.is_none_or(|name| cue.name() == name))
        else {
            return false;
        };
        self.evict(state, index);
        true
    }

    /// Stops the active cue with the lowest volume, optionally restricted to a name.
    /// The oldest wins a tie.
    pub(crate) fn remove_quietest(&self, state: &mut CategoryState, name: Option<&str>) -> bool {
        let Some((index, _)) = state
            .active
            .iter()
            .enumerate()
            .filter(|(_, cue)| name.is_none_or(|name| cue.name() == name))
            .map(|(index, cue)| (index, cue.volume()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            return false;
        };
        self.evict(state, index);
        true
    }

    /// Removes a cue from the active list. Returns false if it was not active.
    pub(crate) fn remove_active(&self, state: &mut CategoryState, cue: &Arc<Cue>) -> bool {
        match state.active.iter().position(|active| Arc::ptr_eq(active, cue)) {
            Some(index) => {
                self.remove_at(state, index);
                true
            }
            None => false,
        }
    }

    fn evict(&self, state: &mut CategoryState, index: usize) {
        let cue = self.remove_at(state, index);
        info!(category = self.name(), cue = cue.name(), "Evicting cue");
        cue.halt(StopOptions::AsAuthored);
    }

    fn remove_at(&self, state: &mut CategoryState, index: usize) -> Arc<Cue> {
        let cue = state.active.remove(index);
        if let Some(count) = state.counts.get_mut(cue.name()) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.counts.remove(cue.name());
            }
        }

        let interrupted = state.fade.as_ref().is_some_and(|fade| {
            Arc::ptr_eq(&fade.queued, &cue) || Arc::ptr_eq(&fade.fading, &cue)
        });
        if interrupted {
            if let Some(fade) = state.fade.take() {
                if Arc::ptr_eq(&fade.queued, &cue) {
                    fade.fading.set_volume_variable(fade.fading_volume);
                } else {
                    fade.queued.set_volume_variable(state.volume);
                }
            }
        }
        cue
    }

    fn finish_crossfade(&self, state: &mut CategoryState) {
        let Some(fade) = state.fade.take() else {
            return;
        };
        if let Some(index) = state
            .active
            .iter()
            .position(|cue| Arc::ptr_eq(cue, &fade.fading))
        {
            state.active.remove(index);
            if let Some(count) = state.counts.get_mut(fade.fading.name()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    state.counts.remove(fade.fading.name());
                }
            }
        }
        fade.fading.halt(StopOptions::AsAuthored);
        fade.queued.set_volume_variable(state.volume);
        debug!(
            category = self.name(),
            stopped = fade.fading.name(),
            queued = fade.queued.name(),
            "Crossfade complete"
        );
    }
}

/// Fraction of `total` covered by `elapsed`. A zero duration is always complete.
fn progress(elapsed: Duration, total: Duration) -> f32 {
    if total.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / total.as_secs_f64()) as f32
    }
}
