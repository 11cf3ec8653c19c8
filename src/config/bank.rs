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

//! Sound bank configuration.
//!
//! A bank declares everything the runtime plays: variables, categories, curves, DSP
//! presets, sounds and cues. Waves are referenced by name and loaded separately.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use config::{Config, File};
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::FilterKind;
use crate::instance::FilterSettings;
use crate::xact::category::{
    CategorySettings, CrossfadeType, MaxInstanceBehavior, DEFAULT_CATEGORY,
    DEFAULT_MAX_INSTANCES,
};
use crate::xact::dsp::ReverbParameter;
use crate::xact::rpc::{Rpc, RpcParameter, RpcPoint};
use crate::xact::sound::ClipDefinition;
use crate::xact::variable::{Variable, DISTANCE, NUM_CUE_INSTANCES, VOLUME};

use super::error::ConfigError;
use super::parse_duration;

/// Converts decibels to a linear gain.
pub(crate) fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// A YAML representation of a sound bank.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct BankConfig {
    #[serde(default)]
    variables: Vec<VariableConfig>,
    #[serde(default)]
    categories: Vec<CategoryConfig>,
    #[serde(default)]
    rpcs: Vec<RpcConfig>,
    #[serde(default)]
    dsp_presets: Vec<DspPresetConfig>,
    #[serde(default)]
    sounds: Vec<SoundConfig>,
    #[serde(default)]
    cues: Vec<CueConfig>,
}

/// A global variable, or a cue-local one when listed under a cue.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct VariableConfig {
    name: String,
    #[serde(default)]
    value: f32,
    #[serde(default)]
    min: f32,
    #[serde(default = "default_variable_max")]
    max: f32,
    #[serde(default = "default_true")]
    public: bool,
    #[serde(default)]
    read_only: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CategoryConfig {
    name: String,
    /// Volume in decibels (default: 0).
    #[serde(default)]
    volume_db: f32,
    max_instances: Option<usize>,
    #[serde(default)]
    behavior: MaxInstanceBehavior,
    /// Fade in duration for queued cues (default: 0s).
    fade_in: Option<String>,
    /// Fade out duration for replaced cues (default: 0s).
    fade_out: Option<String>,
    #[serde(default)]
    crossfade: CrossfadeType,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RpcConfig {
    name: String,
    variable: String,
    parameter: RpcParameter,
    points: Vec<RpcPoint>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DspPresetConfig {
    name: String,
    /// Reverb parameter values by name. Unlisted parameters keep their defaults.
    #[serde(default)]
    parameters: HashMap<String, f32>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SoundConfig {
    name: String,
    /// Volume in decibels (default: 0).
    #[serde(default)]
    volume_db: f32,
    /// Pitch in octaves (default: 0).
    #[serde(default)]
    pitch: f32,
    /// Names of the RPCs applied to this sound.
    #[serde(default)]
    rpcs: Vec<String>,
    /// DSP preset the sound's voices are sent to.
    dsp_preset: Option<String>,
    clips: Vec<ClipConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ClipConfig {
    wave: String,
    #[serde(default)]
    volume_db: f32,
    #[serde(default)]
    pitch: f32,
    #[serde(default)]
    pan: f32,
    /// Delay before the clip starts (default: 0s).
    delay: Option<String>,
    #[serde(default)]
    looped: bool,
    filter: Option<FilterConfig>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct FilterConfig {
    kind: FilterKind,
    frequency: f32,
    #[serde(default = "default_q_factor")]
    q_factor: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CueConfig {
    name: String,
    /// The category the cue plays in (default: "Default").
    category: Option<String>,
    instance_limit: Option<usize>,
    #[serde(default)]
    behavior: MaxInstanceBehavior,
    /// Variable whose value selects the variant.
    user_control: Option<String>,
    #[serde(default)]
    variables: Vec<VariableConfig>,
    variants: Vec<VariantConfig>,
}

/// A sound a cue may play. Either `weight` or a `min`/`max` range.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct VariantConfig {
    sound: String,
    weight: Option<f32>,
    min: Option<f32>,
    max: Option<f32>,
}

fn default_true() -> bool {
    true
}

fn default_variable_max() -> f32 {
    f32::MAX
}

fn default_q_factor() -> f32 {
    1.0
}

/// Parses a reverb parameter by its snake case name.
fn parse_reverb_parameter(name: &str) -> Option<ReverbParameter> {
    let deserializer: StrDeserializer<'_, ValueError> = name.into_deserializer();
    ReverbParameter::deserialize(deserializer).ok()
}

impl BankConfig {
    pub fn new(
        variables: Vec<VariableConfig>,
        categories: Vec<CategoryConfig>,
        rpcs: Vec<RpcConfig>,
        dsp_presets: Vec<DspPresetConfig>,
        sounds: Vec<SoundConfig>,
        cues: Vec<CueConfig>,
    ) -> BankConfig {
        BankConfig {
            variables,
            categories,
            rpcs,
            dsp_presets,
            sounds,
            cues,
        }
    }

    /// Parse a sound bank from a YAML file.
    pub fn deserialize(path: &Path) -> Result<BankConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<BankConfig>()?)
    }

    /// Parse a sound bank from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<BankConfig, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Save the sound bank as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_yml::to_string(self)?)?;
        info!(path = %path.display(), "Saved sound bank");
        Ok(())
    }

    pub fn variables(&self) -> &[VariableConfig] {
        &self.variables
    }

    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    pub fn rpcs(&self) -> &[RpcConfig] {
        &self.rpcs
    }

    pub fn dsp_presets(&self) -> &[DspPresetConfig] {
        &self.dsp_presets
    }

    pub fn sounds(&self) -> &[SoundConfig] {
        &self.sounds
    }

    pub fn cues(&self) -> &[CueConfig] {
        &self.cues
    }

    /// Every wave referenced by a clip.
    pub fn wave_names(&self) -> BTreeSet<String> {
        self.sounds
            .iter()
            .flat_map(|sound| sound.clips.iter().map(|clip| clip.wave.clone()))
            .collect()
    }

    /// Checks every reference and authored value in the bank and reports all
    /// problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let globals = unique_names(
            "variable",
            self.variables.iter().map(|variable| variable.name.as_str()),
            &mut problems,
        );
        let mut categories = unique_names(
            "category",
            self.categories.iter().map(|category| category.name.as_str()),
            &mut problems,
        );
        categories.insert(DEFAULT_CATEGORY);
        let rpcs = unique_names(
            "RPC",
            self.rpcs.iter().map(|rpc| rpc.name.as_str()),
            &mut problems,
        );
        let presets = unique_names(
            "DSP preset",
            self.dsp_presets.iter().map(|preset| preset.name.as_str()),
            &mut problems,
        );
        let sounds = unique_names(
            "sound",
            self.sounds.iter().map(|sound| sound.name.as_str()),
            &mut problems,
        );
        unique_names(
            "cue",
            self.cues.iter().map(|cue| cue.name.as_str()),
            &mut problems,
        );

        for variable in &self.variables {
            variable.check("global variable", &mut problems);
            if is_reserved(&variable.name) {
                problems.push(format!(
                    "global variable {} uses a reserved cue variable name",
                    variable.name
                ));
            }
        }
        for category in &self.categories {
            category.check(&mut problems);
        }
        for rpc in &self.rpcs {
            rpc.check(&mut problems);
        }
        for preset in &self.dsp_presets {
            for parameter in preset.parameters.keys() {
                if parse_reverb_parameter(parameter).is_none() {
                    problems.push(format!(
                        "DSP preset {} has unknown parameter {}",
                        preset.name, parameter
                    ));
                }
            }
        }
        for sound in &self.sounds {
            sound.check(&rpcs, &presets, &mut problems);
        }
        for cue in &self.cues {
            let mut names: HashSet<&str> = globals.clone();
            names.extend([VOLUME, NUM_CUE_INSTANCES, DISTANCE]);
            for variable in &cue.variables {
                variable.check(&format!("cue {} variable", cue.name), &mut problems);
                names.insert(variable.name.as_str());
            }
            cue.check(&categories, &sounds, &mut problems);

            if let Some(control) = &cue.user_control {
                if !names.contains(control.as_str()) {
                    problems.push(format!(
                        "cue {} is controlled by unknown variable {}",
                        cue.name, control
                    ));
                }
            }
            // Curves read variables from the cue playing them.
            for variant in &cue.variants {
                let Some(sound) = self.sounds.iter().find(|sound| sound.name == variant.sound)
                else {
                    continue;
                };
                for rpc in self.rpcs.iter().filter(|rpc| sound.rpcs.contains(&rpc.name)) {
                    if !names.contains(rpc.variable.as_str()) {
                        problems.push(format!(
                            "RPC {} reads variable {} which cue {} does not have",
                            rpc.name, rpc.variable, cue.name
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

fn is_reserved(name: &str) -> bool {
    [VOLUME, NUM_CUE_INSTANCES, DISTANCE].contains(&name)
}

/// Collects names, reporting duplicates.
fn unique_names<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
    problems: &mut Vec<String>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            problems.push(format!("{kind} has an empty name"));
        } else if !seen.insert(name) {
            problems.push(format!("duplicate {kind} {name}"));
        }
    }
    seen
}

impl VariableConfig {
    pub fn new(name: &str, value: f32, min: f32, max: f32) -> VariableConfig {
        VariableConfig {
            name: name.to_string(),
            value,
            min,
            max,
            public: true,
            read_only: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the runtime variable.
    pub fn to_variable(&self, global: bool) -> Variable {
        Variable::new(&self.name, self.value, self.min, self.max)
            .with_public(self.public)
            .with_read_only(self.read_only)
            .with_global(global)
    }

    fn check(&self, kind: &str, problems: &mut Vec<String>) {
        if self.min > self.max {
            problems.push(format!("{kind} {} has min above max", self.name));
        }
    }
}

impl CategoryConfig {
    pub fn new(name: &str, max_instances: usize, behavior: MaxInstanceBehavior) -> CategoryConfig {
        CategoryConfig {
            name: name.to_string(),
            volume_db: 0.0,
            max_instances: Some(max_instances),
            behavior,
            fade_in: None,
            fade_out: None,
            crossfade: CrossfadeType::Linear,
        }
    }

    /// Sets both fade durations.
    pub fn with_fades(mut self, fade_in: &str, fade_out: &str) -> CategoryConfig {
        self.fade_in = Some(fade_in.to_string());
        self.fade_out = Some(fade_out.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the runtime category settings.
    pub fn to_settings(&self) -> Result<CategorySettings, ConfigError> {
        let mut settings = CategorySettings::new(&self.name);
        settings.volume = db_to_gain(self.volume_db);
        settings.max_instances = self.max_instances.unwrap_or(DEFAULT_MAX_INSTANCES);
        settings.behavior = self.behavior;
        settings.crossfade = self.crossfade;
        if let Some(fade_in) = &self.fade_in {
            settings.fade_in = parse_duration(fade_in)?;
        }
        if let Some(fade_out) = &self.fade_out {
            settings.fade_out = parse_duration(fade_out)?;
        }
        Ok(settings)
    }

    fn check(&self, problems: &mut Vec<String>) {
        if self.crossfade != CrossfadeType::Linear {
            problems.push(format!(
                "category {} uses unsupported crossfade type {:?}",
                self.name, self.crossfade
            ));
        }
        if let Err(e) = self.to_settings() {
            problems.push(format!("category {}: {}", self.name, e));
        }
    }
}

impl RpcConfig {
    pub fn new(name: &str, variable: &str, parameter: RpcParameter, points: Vec<RpcPoint>) -> RpcConfig {
        RpcConfig {
            name: name.to_string(),
            variable: variable.to_string(),
            parameter,
            points,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the runtime curve.
    pub fn to_rpc(&self) -> Rpc {
        Rpc::new(&self.name, &self.variable, self.parameter, self.points.clone())
    }

    fn check(&self, problems: &mut Vec<String>) {
        if !matches!(
            self.parameter,
            RpcParameter::Volume | RpcParameter::Pitch | RpcParameter::FilterFrequency
        ) {
            problems.push(format!(
                "RPC {} drives unsupported parameter {:?}",
                self.name, self.parameter
            ));
        }
        if self.points.is_empty() {
            problems.push(format!("RPC {} has no points", self.name));
        }
        if self.points.windows(2).any(|pair| pair[0].x >= pair[1].x) {
            problems.push(format!(
                "RPC {} points are not in strictly ascending x order",
                self.name
            ));
        }
    }
}

impl DspPresetConfig {
    pub fn new(name: &str, parameters: HashMap<String, f32>) -> DspPresetConfig {
        DspPresetConfig {
            name: name.to_string(),
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter values with known names, in preset order.
    pub fn values(&self) -> Vec<(ReverbParameter, f32)> {
        let mut values: Vec<(ReverbParameter, f32)> = self
            .parameters
            .iter()
            .filter_map(|(name, value)| Some((parse_reverb_parameter(name)?, *value)))
            .collect();
        values.sort_by_key(|(parameter, _)| parameter.index());
        values
    }
}

impl SoundConfig {
    pub fn new(name: &str, clips: Vec<ClipConfig>) -> SoundConfig {
        SoundConfig {
            name: name.to_string(),
            volume_db: 0.0,
            pitch: 0.0,
            rpcs: Vec::new(),
            dsp_preset: None,
            clips,
        }
    }

    pub fn with_rpcs(mut self, rpcs: &[&str]) -> SoundConfig {
        self.rpcs = rpcs.iter().map(|rpc| rpc.to_string()).collect();
        self
    }

    pub fn with_dsp_preset(mut self, preset: &str) -> SoundConfig {
        self.dsp_preset = Some(preset.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume(&self) -> f32 {
        db_to_gain(self.volume_db)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn rpcs(&self) -> &[String] {
        &self.rpcs
    }

    pub fn dsp_preset(&self) -> Option<&str> {
        self.dsp_preset.as_deref()
    }

    pub fn clips(&self) -> &[ClipConfig] {
        &self.clips
    }

    fn check(&self, rpcs: &HashSet<&str>, presets: &HashSet<&str>, problems: &mut Vec<String>) {
        if self.clips.is_empty() {
            problems.push(format!("sound {} has no clips", self.name));
        }
        for rpc in &self.rpcs {
            if !rpcs.contains(rpc.as_str()) {
                problems.push(format!("sound {} references unknown RPC {}", self.name, rpc));
            }
        }
        if let Some(preset) = &self.dsp_preset {
            if !presets.contains(preset.as_str()) {
                problems.push(format!(
                    "sound {} references unknown DSP preset {}",
                    self.name, preset
                ));
            }
        }
        for clip in &self.clips {
            if clip.wave.is_empty() {
                problems.push(format!("sound {} has a clip without a wave", self.name));
            }
            if let Err(e) = clip.to_clip() {
                problems.push(format!("sound {}: {}", self.name, e));
            }
        }
    }
}

impl ClipConfig {
    pub fn new(wave: &str) -> ClipConfig {
        ClipConfig {
            wave: wave.to_string(),
            volume_db: 0.0,
            pitch: 0.0,
            pan: 0.0,
            delay: None,
            looped: false,
            filter: None,
        }
    }

    pub fn with_delay(mut self, delay: &str) -> ClipConfig {
        self.delay = Some(delay.to_string());
        self
    }

    pub fn with_looped(mut self, looped: bool) -> ClipConfig {
        self.looped = looped;
        self
    }

    pub fn wave(&self) -> &str {
        &self.wave
    }

    /// Builds the runtime clip.
    pub fn to_clip(&self) -> Result<ClipDefinition, ConfigError> {
        Ok(ClipDefinition {
            wave: self.wave.clone(),
            volume: db_to_gain(self.volume_db),
            pitch: self.pitch,
            pan: self.pan.clamp(-1.0, 1.0),
            delay: match &self.delay {
                Some(delay) => parse_duration(delay)?,
                None => Default::default(),
            },
            looped: self.looped,
            filter: self.filter.map(|filter| FilterSettings {
                kind: filter.kind,
                frequency: filter.frequency,
                q_factor: filter.q_factor,
            }),
        })
    }
}

impl CueConfig {
    pub fn new(name: &str, category: &str, variants: Vec<VariantConfig>) -> CueConfig {
        CueConfig {
            name: name.to_string(),
            category: Some(category.to_string()),
            instance_limit: None,
            behavior: MaxInstanceBehavior::Fail,
            user_control: None,
            variables: Vec::new(),
            variants,
        }
    }

    pub fn with_instance_limit(mut self, limit: usize, behavior: MaxInstanceBehavior) -> CueConfig {
        self.instance_limit = Some(limit);
        self.behavior = behavior;
        self
    }

    pub fn with_user_control(mut self, variable: &str) -> CueConfig {
        self.user_control = Some(variable.to_string());
        self
    }

    pub fn with_variables(mut self, variables: Vec<VariableConfig>) -> CueConfig {
        self.variables = variables;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cue's category (default: "Default").
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    /// The instance limit (default: 255).
    pub fn instance_limit(&self) -> usize {
        self.instance_limit.unwrap_or(DEFAULT_MAX_INSTANCES)
    }

    pub fn behavior(&self) -> MaxInstanceBehavior {
        self.behavior
    }

    pub fn user_control(&self) -> Option<&str> {
        self.user_control.as_deref()
    }

    pub fn variables(&self) -> &[VariableConfig] {
        &self.variables
    }

    pub fn variants(&self) -> &[VariantConfig] {
        &self.variants
    }

    fn check(&self, categories: &HashSet<&str>, sounds: &HashSet<&str>, problems: &mut Vec<String>) {
        if !categories.contains(self.category()) {
            problems.push(format!(
                "cue {} references unknown category {}",
                self.name,
                self.category()
            ));
        }
        if self.variants.is_empty() {
            problems.push(format!("cue {} has no variants", self.name));
        }
        for variant in &self.variants {
            if !sounds.contains(variant.sound.as_str()) {
                problems.push(format!(
                    "cue {} references unknown sound {}",
                    self.name, variant.sound
                ));
            }
            if variant.weight.is_some() && (variant.min.is_some() || variant.max.is_some()) {
                problems.push(format!(
                    "cue {} variant {} has both a weight and a range",
                    self.name, variant.sound
                ));
            }
            let (min, max) = variant.range();
            if max < min {
                problems.push(format!(
                    "cue {} variant {} has an inverted range",
                    self.name, variant.sound
                ));
            }
        }
        if self.user_control.is_none()
            && !self.variants.is_empty()
            && self.variants.iter().all(|variant| variant.weight_value() <= 0.0)
        {
            problems.push(format!("cue {} has no variant with a nonzero weight", self.name));
        }
    }
}

impl VariantConfig {
    /// A weighted variant.
    pub fn weighted(sound: &str, weight: f32) -> VariantConfig {
        VariantConfig {
            sound: sound.to_string(),
            weight: Some(weight),
            min: None,
            max: None,
        }
    }

    /// A variant selected by a control value in `[min, max]`.
    pub fn ranged(sound: &str, min: f32, max: f32) -> VariantConfig {
        VariantConfig {
            sound: sound.to_string(),
            weight: None,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn sound(&self) -> &str {
        &self.sound
    }

    /// The probability range. A weight `w` is the range `[0, w]`.
    pub fn range(&self) -> (f32, f32) {
        match self.weight {
            Some(weight) => (0.0, weight),
            None => (self.min.unwrap_or(0.0), self.max.unwrap_or(1.0)),
        }
    }

    fn weight_value(&self) -> f32 {
        let (min, max) = self.range();
        max - min
    }
}
