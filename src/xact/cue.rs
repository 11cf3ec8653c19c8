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

//! Cues.
//!
//! A cue picks one sound out of its variants, expands it into voices and keeps those
//! voices in step with its variables, its curves and its category. Voices are not
//! started by `play`; the next update tick starts them.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace};

use crate::backend::SourceHandle;
use crate::positional::{self, AudioEmitter, AudioListener};

use super::category::{AudioCategory, MaxInstanceBehavior};
use super::engine::EngineContext;
use super::error::{AudioError, Result};
use super::rpc::RpcParameter;
use super::snapshot::CueSnapshot;
use super::sound::{SoundDefinition, SoundInstance};
use super::variable::{self, Variable, DISTANCE, NUM_CUE_INSTANCES, VOLUME};

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CueStatus {
    /// Never played, or played without being admitted.
    Created,
    /// Admitted; voices start on the next update.
    Queued,
    Playing,
    Stopped,
    Disposed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopOptions {
    #[default]
    AsAuthored,
    Immediate,
}

/// One selectable sound of a cue and its probability range.
#[derive(Clone, Debug)]
pub struct CueVariant {
    pub sound: Arc<SoundDefinition>,
    pub min: f32,
    pub max: f32,
}

impl CueVariant {
    /// Weight of the variant in random selection.
    pub fn weight(&self) -> f32 {
        (self.max - self.min).max(0.0)
    }

    fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Authored description of a cue.
#[derive(Debug)]
pub struct CueDefinition {
    name: String,
    category: String,
    variants: Vec<CueVariant>,
    instance_limit: usize,
    behavior: MaxInstanceBehavior,
    user_control: Option<String>,
    variables: Vec<Variable>,
}

impl CueDefinition {
    pub fn new(
        name: &str,
        category: &str,
        variants: Vec<CueVariant>,
        instance_limit: usize,
        behavior: MaxInstanceBehavior,
        user_control: Option<&str>,
        variables: Vec<Variable>,
    ) -> CueDefinition {
        CueDefinition {
            name: name.to_string(),
            category: category.to_string(),
            variants,
            instance_limit,
            behavior,
            user_control: user_control.map(str::to_string),
            variables,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn variants(&self) -> &[CueVariant] {
        &self.variants
    }

    pub fn instance_limit(&self) -> usize {
        self.instance_limit
    }

    pub fn behavior(&self) -> MaxInstanceBehavior {
        self.behavior
    }

    /// The variable that selects the variant, if the cue is user controlled.
    pub fn user_control(&self) -> Option<&str> {
        self.user_control.as_deref()
    }

    /// Authored cue-local variables.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

pub(crate) struct CueInner {
    status: CueStatus,
    paused: bool,
    variables: Vec<Variable>,
    active_sound: Option<Arc<SoundDefinition>>,
    voices: Vec<SoundInstance>,
    /// Last observed value of the user control variable.
    control_value: Option<f32>,
    positional: Option<(AudioListener, AudioEmitter)>,
    last_stop: Option<StopOptions>,
}

impl CueInner {
    fn variable(&self, name: &str) -> Option<f32> {
        variable::find(&self.variables, name).map(Variable::value)
    }

    /// Writes a variable regardless of its flags. Only meant for the reserved
    /// variables every cue carries.
    pub(crate) fn set_internal(&mut self, name: &str, value: f32) {
        let variable = variable::find_mut(&mut self.variables, name);
        debug_assert!(variable.is_some(), "cue has no variable named {name}");
        if let Some(variable) = variable {
            variable.set_value(value);
        }
    }

    fn start_voices(&mut self) {
        let paused = self.paused;
        for voice in &mut self.voices {
            if voice.instance.play() && paused {
                voice.instance.pause();
            }
        }
    }

    fn release_voices(&mut self) {
        for voice in &mut self.voices {
            voice.instance.stop();
        }
        self.voices.clear();
    }
}

pub struct Cue {
    definition: Arc<CueDefinition>,
    category: Arc<AudioCategory>,
    context: Arc<EngineContext>,
    /// Disposed by the runtime once finished rather than kept for reuse.
    managed: bool,
    state: Mutex<CueInner>,
}

impl Cue {
    pub(crate) fn new(
        definition: Arc<CueDefinition>,
        category: Arc<AudioCategory>,
        context: Arc<EngineContext>,
        managed: bool,
    ) -> Arc<Cue> {
        let mut variables = Variable::reserved_cue_variables();
        for authored in definition.variables() {
            if variable::find(&variables, authored.name()).is_none() {
                variables.push(authored.clone());
            }
        }

        Arc::new(Cue {
            definition,
            category,
            context,
            managed,
            state: Mutex::new(CueInner {
                status: CueStatus::Created,
                paused: false,
                variables,
                active_sound: None,
                voices: Vec::new(),
                control_value: None,
                positional: None,
                last_stop: None,
            }),
        })
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<CueDefinition> {
        &self.definition
    }

    pub fn category(&self) -> &Arc<AudioCategory> {
        &self.category
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn status(&self) -> CueStatus {
        self.lock().status
    }

    /// True while queued or playing.
    pub fn is_playing(&self) -> bool {
        matches!(self.status(), CueStatus::Queued | CueStatus::Playing)
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Name of the sound currently resolved.
    pub fn active_sound(&self) -> Option<String> {
        self.lock()
            .active_sound
            .as_ref()
            .map(|sound| sound.name().to_string())
    }

    pub fn voice_count(&self) -> usize {
        self.lock().voices.len()
    }

    /// Backend sources of the voices that are currently started.
    pub fn voice_sources(&self) -> Vec<SourceHandle> {
        self.lock()
            .voices
            .iter()
            .filter_map(|voice| voice.instance.source())
            .collect()
    }

    /// How the cue was last stopped, if it was stopped since its last play.
    pub fn last_stop_options(&self) -> Option<StopOptions> {
        self.lock().last_stop
    }

    /// Current value of the `Volume` variable.
    pub fn volume(&self) -> f32 {
        self.lock().variable(VOLUME).unwrap_or(1.0)
    }

    pub fn get_variable(&self, name: &str) -> Result<f32> {
        self.lock()
            .variable(name)
            .ok_or_else(|| AudioError::VariableNotFound {
                name: name.to_string(),
            })
    }

    /// Sets a cue-local variable. The value is clamped to the variable's bounds.
    pub fn set_variable(&self, name: &str, value: f32) -> Result<()> {
        let mut inner = self.lock();
        let variable = variable::find_mut(&mut inner.variables, name).ok_or_else(|| {
            AudioError::VariableNotFound {
                name: name.to_string(),
            }
        })?;
        if !variable.is_public() || variable.is_read_only() {
            return Err(AudioError::VariableNotWritable {
                name: name.to_string(),
            });
        }
        variable.set_value(value);
        Ok(())
    }

    /// Admits the cue into its category and resolves its sound. Playing cues are
    /// left alone, as are cues refused by an instance limit.
    pub fn play(self: &Arc<Self>) -> Result<()> {
        let mut category = self.category.lock();
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.status {
            CueStatus::Disposed => return Err(AudioError::CueDisposed(self.name().to_string())),
            CueStatus::Queued | CueStatus::Playing => return Ok(()),
            CueStatus::Created | CueStatus::Stopped => {}
        }

        let name = self.name();
        let count = category.count(name);
        inner.set_internal(NUM_CUE_INSTANCES, count as f32);
        let previous_volume = inner.variable(VOLUME).unwrap_or(1.0);

        let mut admitted = false;
        if count >= self.definition.instance_limit {
            match self.definition.behavior {
                MaxInstanceBehavior::Fail => {
                    debug!(
                        cue = name,
                        limit = self.definition.instance_limit,
                        "Cue instance limit reached"
                    );
                    return Ok(());
                }
                MaxInstanceBehavior::Queue => {
                    if let Some(oldest) = category.oldest(Some(name)) {
                        self.category
                            .begin_crossfade(&mut category, oldest, self, inner);
                    }
                    self.category.push(&mut category, self);
                    admitted = true;
                }
                MaxInstanceBehavior::ReplaceOldest | MaxInstanceBehavior::ReplaceLowestPriority => {
                    self.category.remove_oldest(&mut category, Some(name));
                }
                MaxInstanceBehavior::ReplaceQuietest => {
                    self.category.remove_quietest(&mut category, Some(name));
                }
            }
        }

        if !admitted && !self.category.admit(&mut category, self, inner) {
            return Ok(());
        }

        if let Err(err) = self.resolve(inner) {
            self.category.remove_active(&mut category, self);
            inner.release_voices();
            inner.active_sound = None;
            inner.set_internal(VOLUME, previous_volume);
            return Err(err);
        }
        if let Some((listener, emitter)) = inner.positional.clone() {
            Self::place(inner, &listener, &emitter);
        }

        inner.status = CueStatus::Queued;
        inner.last_stop = None;
        debug!(
            cue = name,
            sound = inner.active_sound.as_ref().map(|sound| sound.name()),
            voices = inner.voices.len(),
            "Cue queued"
        );
        Ok(())
    }

    /// Stops the cue and removes it from its category.
    pub fn stop(self: &Arc<Self>, options: StopOptions) {
        let mut category = self.category.lock();
        let mut guard = self.lock();
        if !matches!(guard.status, CueStatus::Queued | CueStatus::Playing) {
            return;
        }
        self.halt_locked(&mut guard, options);
        drop(guard);
        self.category.remove_active(&mut category, self);
    }

    /// Stops the cue if needed and marks it disposed. A disposed cue cannot be played.
    pub fn dispose(self: &Arc<Self>) {
        let mut category = self.category.lock();
        let mut guard = self.lock();
        if matches!(guard.status, CueStatus::Queued | CueStatus::Playing) {
            self.halt_locked(&mut guard, StopOptions::Immediate);
            drop(guard);
            self.category.remove_active(&mut category, self);
            guard = self.lock();
        }
        guard.status = CueStatus::Disposed;
    }

    pub fn pause(&self) {
        let mut inner = self.lock();
        if inner.paused {
            return;
        }
        inner.paused = true;
        if inner.status == CueStatus::Playing {
            for voice in &mut inner.voices {
                voice.instance.pause();
            }
        }
    }

    pub fn resume(&self) {
        let mut inner = self.lock();
        if !inner.paused {
            return;
        }
        inner.paused = false;
        if inner.status == CueStatus::Playing {
            for voice in &mut inner.voices {
                voice.instance.resume();
            }
        }
    }

    /// Makes the cue positional. Voices are placed now and again on every update.
    pub fn apply_3d(&self, listener: &AudioListener, emitter: &AudioEmitter) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.positional = Some((listener.clone(), emitter.clone()));
        Self::place(inner, listener, emitter);
    }

    pub fn snapshot(&self) -> CueSnapshot {
        let inner = self.lock();
        CueSnapshot {
            name: self.name().to_string(),
            status: inner.status,
            paused: inner.paused,
            volume: inner.variable(VOLUME).unwrap_or(1.0),
            sound: inner
                .active_sound
                .as_ref()
                .map(|sound| sound.name().to_string()),
            voices: inner.voices.len(),
        }
    }

    /// Advances the cue by one tick. Returns false once the cue has finished and
    /// should leave its category.
    pub(crate) fn update(&self) -> Result<bool> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.status {
            CueStatus::Queued => {
                inner.start_voices();
                inner.status = CueStatus::Playing;
                debug!(cue = self.name(), voices = inner.voices.len(), "Cue started");
            }
            CueStatus::Playing => {}
            CueStatus::Created | CueStatus::Stopped | CueStatus::Disposed => return Ok(false),
        }

        let paused = inner.paused;
        for voice in inner.voices.iter_mut() {
            if voice.instance.pending_start() && voice.instance.play() && paused {
                voice.instance.pause();
            }
        }
        inner.voices.retain(|voice| !voice.instance.is_finished());

        if let Some(control) = self.definition.user_control() {
            let value = self.lookup(inner, control)?;
            if inner.control_value != Some(value) {
                debug!(cue = self.name(), control, value, "Control variable changed");
                inner.release_voices();
                inner.control_value = Some(value);
                inner.active_sound = select_controlled(self.definition.variants(), value)
                    .map(|index| self.definition.variants()[index].sound.clone());
                if let Some(sound) = inner.active_sound.clone() {
                    inner.voices = sound.instantiate(&self.context.device, &self.context.waves.read())?;
                    inner.start_voices();
                }
            }
            if inner.active_sound.is_none() {
                return Ok(true);
            }
        }

        if let Some((listener, emitter)) = inner.positional.clone() {
            Self::place(inner, &listener, &emitter);
        }

        let mut rpc_volume = 1.0f32;
        let mut rpc_pitch = 0.0f32;
        if let Some(sound) = inner.active_sound.clone() {
            for rpc in sound.rpcs() {
                let output = rpc.evaluate(self.lookup(inner, rpc.variable())?);
                match rpc.parameter() {
                    RpcParameter::Volume => rpc_volume *= 10f32.powf(output / 20.0),
                    RpcParameter::Pitch => rpc_pitch += output / 1000.0,
                    RpcParameter::FilterFrequency => {
                        // TODO: retune the voices' filters once SoundEffectInstance can
                        // update a live filter.
                        trace!(cue = self.name(), rpc = rpc.name(), output, "Filter frequency");
                    }
                    parameter => return Err(AudioError::UnsupportedRpcParameter(parameter)),
                }
            }
        }

        let cue_volume = inner.variable(VOLUME).unwrap_or(1.0);
        for voice in inner.voices.iter_mut() {
            voice
                .instance
                .set_volume(voice.volume * cue_volume * rpc_volume);
            voice.instance.set_pitch_unclamped(voice.pitch + rpc_pitch);
        }

        if inner.voices.is_empty() && self.definition.user_control().is_none() {
            inner.status = if self.managed {
                CueStatus::Disposed
            } else {
                CueStatus::Stopped
            };
            return Ok(false);
        }
        Ok(true)
    }

    /// Stops every voice. The caller removes the cue from its category.
    pub(crate) fn halt(&self, options: StopOptions) {
        let mut inner = self.lock();
        self.halt_locked(&mut inner, options);
    }

    pub(crate) fn set_volume_variable(&self, volume: f32) {
        self.lock().set_internal(VOLUME, volume);
    }

    pub(crate) fn set_num_instances(&self, count: usize) {
        self.lock().set_internal(NUM_CUE_INSTANCES, count as f32);
    }

    fn lock(&self) -> MutexGuard<'_, CueInner> {
        self.context.device.lock(&self.state)
    }

    fn halt_locked(&self, inner: &mut CueInner, options: StopOptions) {
        if inner.status == CueStatus::Disposed {
            return;
        }
        let voices = inner.voices.len();
        inner.release_voices();
        inner.active_sound = None;
        inner.control_value = None;
        inner.paused = false;
        inner.last_stop = Some(options);
        inner.status = if self.managed {
            CueStatus::Disposed
        } else {
            CueStatus::Stopped
        };
        debug!(cue = self.name(), ?options, voices, "Cue stopped");
    }

    /// Picks the variant to play and builds its voices.
    fn resolve(&self, inner: &mut CueInner) -> Result<()> {
        let variants = self.definition.variants();
        let index = match self.definition.user_control() {
            Some(control) => {
                let value = self.lookup(inner, control)?;
                inner.control_value = Some(value);
                select_controlled(variants, value)
            }
            None => {
                let weights: Vec<f32> = variants.iter().map(CueVariant::weight).collect();
                let total: f32 = weights.iter().sum();
                let draw = self.context.rng.lock().gen::<f32>() * total;
                select_weighted(&weights, draw)
            }
        };

        inner.release_voices();
        inner.active_sound = index.map(|index| variants[index].sound.clone());
        if let Some(sound) = inner.active_sound.clone() {
            inner.voices = sound.instantiate(&self.context.device, &self.context.waves.read())?;
        }
        Ok(())
    }

    /// Reads a variable, preferring a registered global of the same name.
    fn lookup(&self, inner: &CueInner, name: &str) -> Result<f32> {
        if let Some(global) = variable::find(&self.context.globals.read(), name) {
            if global.is_global() {
                return Ok(global.value());
            }
        }
        inner
            .variable(name)
            .ok_or_else(|| AudioError::VariableNotFound {
                name: name.to_string(),
            })
    }

    fn place(inner: &mut CueInner, listener: &AudioListener, emitter: &AudioEmitter) {
        let placement = positional::placement(listener, emitter);
        for voice in &mut inner.voices {
            voice.instance.set_position(placement.position);
        }
        inner.set_internal(DISTANCE, placement.distance);
    }
}

impl fmt::Debug for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cue")
            .field("name", &self.name())
            .field("category", &self.category.name())
            .field("managed", &self.managed)
            .finish()
    }
}

/// Picks a variant for a random `draw` in `[0, sum(weights))`.
///
/// Variants are walked last to first. A variant is chosen when the draw lies above
/// the weight remaining below it. A draw that matches nothing falls back to the first
/// variant with a nonzero weight.
pub(crate) fn select_weighted(weights: &[f32], draw: f32) -> Option<usize> {
    let mut remaining: f32 = weights.iter().sum();
    for (index, weight) in weights.iter().enumerate().rev() {
        if draw > remaining - weight {
            return Some(index);
        }
        remaining -= weight;
    }
    weights.iter().position(|weight| *weight > 0.0)
}

/// Picks the first variant whose range contains `value`.
pub(crate) fn select_controlled(variants: &[CueVariant], value: f32) -> Option<usize> {
    variants.iter().position(|variant| variant.contains(value))
}
