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

//! The runtime that owns the device, the authored tables and the categories.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::backend::null::NullBackend;
use crate::backend::{Backend, BackendError};
use crate::config::{BankConfig, RuntimeConfig};
use crate::device::clock::{Clock, SystemClock};
use crate::device::AudioDevice;
use crate::instance::dynamic::DynamicSoundEffectInstance;
use crate::instance::{SoundEffect, WaveData};

use super::category::{AudioCategory, CategorySettings, DEFAULT_CATEGORY};
use super::cue::{Cue, CueDefinition, CueVariant, StopOptions};
use super::dsp::DspPreset;
use super::error::{AudioError, Result};
use super::rpc::Rpc;
use super::snapshot::RuntimeSnapshot;
use super::sound::SoundDefinition;
use super::variable::{self, Variable};

/// State shared between the runtime and every cue it builds.
pub(crate) struct EngineContext {
    pub(crate) device: Arc<AudioDevice>,
    /// Engine-owned global variables. Cues read them by name and never copy them.
    pub(crate) globals: RwLock<Vec<Variable>>,
    pub(crate) waves: RwLock<HashMap<String, Arc<SoundEffect>>>,
    pub(crate) rng: Mutex<StdRng>,
}

/// A cue runtime over one audio device.
///
/// Content is added with [`AudioRuntime::load_bank`] and [`AudioRuntime::load_wave`],
/// cues are played with [`AudioRuntime::play_cue`] or [`AudioRuntime::get_cue`], and
/// [`AudioRuntime::update`] must be called once per tick from the thread that created
/// the runtime.
pub struct AudioRuntime {
    context: Arc<EngineContext>,
    categories: BTreeMap<String, Arc<AudioCategory>>,
    rpcs: HashMap<String, Arc<Rpc>>,
    presets: HashMap<String, Arc<DspPreset>>,
    sounds: HashMap<String, Arc<SoundDefinition>>,
    cues: HashMap<String, Arc<CueDefinition>>,
    tick_interval: Duration,
}

impl AudioRuntime {
    /// Creates a runtime on the system clock. Without a backend, or when the
    /// configuration asks for the null device, a [`NullBackend`] is used.
    pub fn new(config: &RuntimeConfig, backend: Option<Arc<dyn Backend>>) -> Result<AudioRuntime> {
        Self::with_clock(config, backend, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        config: &RuntimeConfig,
        backend: Option<Arc<dyn Backend>>,
        clock: Arc<dyn Clock>,
    ) -> Result<AudioRuntime> {
        let (backend, device_name): (Arc<dyn Backend>, Option<&str>) = match backend {
            Some(backend) if !config.null_device() => (backend, config.device()),
            _ => {
                info!("Using the null audio device");
                let backend: Arc<dyn Backend> = Arc::new(NullBackend::new());
                (backend, None)
            }
        };
        debug!(backend = %backend, devices = ?backend.devices(), "Available audio devices");
        backend.open_device(device_name)?;

        let device = AudioDevice::new(backend, clock);
        device.set_master_volume(config.master_volume());

        let rng = match config.random_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut categories = BTreeMap::new();
        categories.insert(
            DEFAULT_CATEGORY.to_string(),
            AudioCategory::new(device.clone(), CategorySettings::new(DEFAULT_CATEGORY)),
        );

        Ok(AudioRuntime {
            context: Arc::new(EngineContext {
                device,
                globals: RwLock::new(Vec::new()),
                waves: RwLock::new(HashMap::new()),
                rng: Mutex::new(rng),
            }),
            categories,
            rpcs: HashMap::new(),
            presets: HashMap::new(),
            sounds: HashMap::new(),
            cues: HashMap::new(),
            tick_interval: config.tick_interval()?,
        })
    }

    pub fn device(&self) -> &Arc<AudioDevice> {
        &self.context.device
    }

    /// How often [`AudioRuntime::update`] should be called.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Validates a sound bank and adds its content. Entries replace earlier ones of
    /// the same name. Nothing is added if the bank is invalid.
    pub fn load_bank(&mut self, bank: &BankConfig) -> Result<()> {
        bank.validate()?;

        {
            let mut globals = self.context.globals.write();
            for config in bank.variables() {
                let global = config.to_variable(true);
                match variable::find_mut(&mut globals, config.name()) {
                    Some(existing) => *existing = global,
                    None => globals.push(global),
                }
            }
        }

        for config in bank.categories() {
            self.add_category(config.to_settings()?);
        }

        for config in bank.rpcs() {
            self.rpcs
                .insert(config.name().to_string(), Arc::new(config.to_rpc()));
        }

        for config in bank.dsp_presets() {
            let preset = DspPreset::new(self.device().clone(), config.name(), &config.values());
            self.presets.insert(config.name().to_string(), preset);
        }

        for config in bank.sounds() {
            let rpcs = config
                .rpcs()
                .iter()
                .map(|name| self.rpc(name))
                .collect::<Result<Vec<_>>>()?;
            let reverb = config
                .dsp_preset()
                .map(|name| self.dsp_preset(name))
                .transpose()?;
            let clips = config
                .clips()
                .iter()
                .map(|clip| clip.to_clip())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            self.add_sound(SoundDefinition::new(
                config.name(),
                config.volume(),
                config.pitch(),
                clips,
                rpcs,
                reverb,
            ));
        }

        for config in bank.cues() {
            let variants = config
                .variants()
                .iter()
                .map(|variant| {
                    let (min, max) = variant.range();
                    Ok(CueVariant {
                        sound: self.sound(variant.sound())?,
                        min,
                        max,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let variables = config
                .variables()
                .iter()
                .map(|variable| variable.to_variable(false))
                .collect();
            self.add_cue(CueDefinition::new(
                config.name(),
                config.category(),
                variants,
                config.instance_limit(),
                config.behavior(),
                config.user_control(),
                variables,
            ));
        }

        info!(
            categories = bank.categories().len(),
            sounds = bank.sounds().len(),
            cues = bank.cues().len(),
            waves = bank.wave_names().len(),
            "Loaded sound bank"
        );
        Ok(())
    }

    /// Adds or replaces a category. Cues already built keep the category they were
    /// built with.
    pub fn add_category(&mut self, settings: CategorySettings) -> Arc<AudioCategory> {
        let category = AudioCategory::new(self.device().clone(), settings);
        self.categories
            .insert(category.name().to_string(), category.clone());
        category
    }

    /// Adds or replaces a sound. Unlike bank content it is not validated.
    pub fn add_sound(&mut self, sound: SoundDefinition) -> Arc<SoundDefinition> {
        let sound = Arc::new(sound);
        self.sounds.insert(sound.name().to_string(), sound.clone());
        sound
    }

    /// Adds or replaces a cue. Unlike bank content it is not validated.
    pub fn add_cue(&mut self, definition: CueDefinition) {
        self.cues
            .insert(definition.name().to_string(), Arc::new(definition));
    }

    /// Uploads a wave that clips can reference by name.
    pub fn load_wave(&self, name: &str, wave: &WaveData) -> Result<()> {
        let effect = SoundEffect::new(self.device().clone(), name, wave).ok_or_else(|| {
            BackendError::Unavailable(format!("no buffer available for wave {name}"))
        })?;
        self.context.waves.write().insert(name.to_string(), effect);
        Ok(())
    }

    pub fn wave(&self, name: &str) -> Option<Arc<SoundEffect>> {
        self.context.waves.read().get(name).cloned()
    }

    pub fn category(&self, name: &str) -> Result<Arc<AudioCategory>> {
        self.categories
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::UnknownCategory(name.to_string()))
    }

    /// All categories, ordered by name.
    pub fn categories(&self) -> Vec<Arc<AudioCategory>> {
        self.categories.values().cloned().collect()
    }

    pub fn rpc(&self, name: &str) -> Result<Arc<Rpc>> {
        self.rpcs
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::UnknownRpc(name.to_string()))
    }

    pub fn sound(&self, name: &str) -> Result<Arc<SoundDefinition>> {
        self.sounds
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::UnknownSound(name.to_string()))
    }

    pub fn dsp_preset(&self, name: &str) -> Result<Arc<DspPreset>> {
        self.presets
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::UnknownDspPreset(name.to_string()))
    }

    /// Clamps and applies one parameter of a DSP preset.
    pub fn set_dsp_parameter(&self, preset: &str, index: usize, value: f32) -> Result<()> {
        self.dsp_preset(preset)?.set_parameter(index, value)
    }

    /// Builds a cue owned by the caller. It can be played again after it stops.
    pub fn get_cue(&self, name: &str) -> Result<Arc<Cue>> {
        self.build_cue(name, false)
    }

    /// Builds and plays a cue that is disposed once it finishes.
    pub fn play_cue(&self, name: &str) -> Result<Arc<Cue>> {
        let cue = self.build_cue(name, true)?;
        cue.play()?;
        Ok(cue)
    }

    pub fn get_global_variable(&self, name: &str) -> Result<f32> {
        variable::find(&self.context.globals.read(), name)
            .map(Variable::value)
            .ok_or_else(|| AudioError::VariableNotFound {
                name: name.to_string(),
            })
    }

    /// Sets a global variable. The value is clamped to the variable's bounds.
    pub fn set_global_variable(&self, name: &str, value: f32) -> Result<()> {
        let mut globals = self.context.globals.write();
        let variable =
            variable::find_mut(&mut globals, name).ok_or_else(|| AudioError::VariableNotFound {
                name: name.to_string(),
            })?;
        if !variable.is_public() || variable.is_read_only() {
            return Err(AudioError::VariableNotWritable {
                name: name.to_string(),
            });
        }
        variable.set_value(value);
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.device().master_volume()
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.device().set_master_volume(volume);
    }

    /// Creates a streaming voice. It is updated by the device once played.
    pub fn create_stream(&self, sample_rate: u32, channels: u16) -> Arc<DynamicSoundEffectInstance> {
        DynamicSoundEffectInstance::new(self.device().clone(), sample_rate, channels)
    }

    /// Runs one tick: device housekeeping, then every category and its cues.
    pub fn update(&self) -> Result<()> {
        self.device().update();
        for category in self.categories.values() {
            category.update()?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            master_volume: self.master_volume(),
            active_instances: self.device().active_instances(),
            active_streams: self.device().active_streams(),
            globals: self.context.globals.read().clone(),
            categories: self
                .categories
                .values()
                .map(|category| category.snapshot())
                .collect(),
        }
    }

    fn build_cue(&self, name: &str, managed: bool) -> Result<Arc<Cue>> {
        let definition = self
            .cues
            .get(name)
            .cloned()
            .ok_or_else(|| AudioError::UnknownCue(name.to_string()))?;
        let category = self.category(definition.category())?;
        Ok(Cue::new(definition, category, self.context.clone(), managed))
    }
}

impl Drop for AudioRuntime {
    fn drop(&mut self) {
        for category in self.categories.values() {
            category.stop(StopOptions::Immediate);
        }
        self.context.waves.write().clear();
        self.presets.clear();
        self.context.device.shutdown();
    }
}
