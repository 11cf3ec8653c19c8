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

//! DSP reverb presets.
//!
//! A preset carries 22 reverb parameters in a fixed order and owns one backend
//! reverb. Sounds that name the preset send their voices into that reverb.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{ReverbHandle, ReverbProperty};
use crate::device::AudioDevice;

use super::error::{AudioError, Result};

/// Number of parameters in a preset.
pub const REVERB_PARAMETER_COUNT: usize = 22;

/// The reverb parameters, in preset order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbParameter {
    WetDryMix,
    ReflectionsDelay,
    ReverbDelay,
    RearDelay,
    PositionLeft,
    PositionRight,
    PositionMatrixLeft,
    PositionMatrixRight,
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
}

impl ReverbParameter {
    pub const ALL: [ReverbParameter; REVERB_PARAMETER_COUNT] = [
        ReverbParameter::WetDryMix,
        ReverbParameter::ReflectionsDelay,
        ReverbParameter::ReverbDelay,
        ReverbParameter::RearDelay,
        ReverbParameter::PositionLeft,
        ReverbParameter::PositionRight,
        ReverbParameter::PositionMatrixLeft,
        ReverbParameter::PositionMatrixRight,
        ReverbParameter::EarlyDiffusion,
        ReverbParameter::LateDiffusion,
        ReverbParameter::LowEqGain,
        ReverbParameter::LowEqCutoff,
        ReverbParameter::HighEqGain,
        ReverbParameter::HighEqCutoff,
        ReverbParameter::RoomFilterFrequency,
        ReverbParameter::RoomFilterMain,
        ReverbParameter::RoomFilterHighFrequency,
        ReverbParameter::ReflectionsGain,
        ReverbParameter::ReverbGain,
        ReverbParameter::DecayTime,
        ReverbParameter::Density,
        ReverbParameter::RoomSize,
    ];

    pub fn from_index(index: usize) -> Option<ReverbParameter> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bounds of the parameter, inclusive.
    pub fn range(self) -> (f32, f32) {
        match self {
            ReverbParameter::WetDryMix => (0.0, 100.0),
            ReverbParameter::ReflectionsDelay => (0.0, 300.0),
            ReverbParameter::ReverbDelay => (0.0, 85.0),
            ReverbParameter::RearDelay => (0.0, 5.0),
            ReverbParameter::PositionLeft | ReverbParameter::PositionRight => (0.0, 30.0),
            ReverbParameter::PositionMatrixLeft | ReverbParameter::PositionMatrixRight => {
                (0.0, 30.0)
            }
            ReverbParameter::EarlyDiffusion | ReverbParameter::LateDiffusion => (0.0, 15.0),
            ReverbParameter::LowEqGain => (0.0, 12.0),
            ReverbParameter::LowEqCutoff => (0.0, 9.0),
            ReverbParameter::HighEqGain => (0.0, 8.0),
            ReverbParameter::HighEqCutoff => (0.0, 14.0),
            ReverbParameter::RoomFilterFrequency => (20.0, 20000.0),
            ReverbParameter::RoomFilterMain | ReverbParameter::RoomFilterHighFrequency => {
                (-100.0, 0.0)
            }
            ReverbParameter::ReflectionsGain | ReverbParameter::ReverbGain => (-100.0, 20.0),
            ReverbParameter::DecayTime => (0.1, f32::MAX),
            ReverbParameter::Density => (0.0, 100.0),
            ReverbParameter::RoomSize => (1.0, 100.0),
        }
    }

    pub fn default_value(self) -> f32 {
        match self {
            ReverbParameter::WetDryMix => 100.0,
            ReverbParameter::ReflectionsDelay
            | ReverbParameter::ReverbDelay
            | ReverbParameter::RearDelay => 5.0,
            ReverbParameter::PositionLeft | ReverbParameter::PositionRight => 6.0,
            ReverbParameter::PositionMatrixLeft | ReverbParameter::PositionMatrixRight => 27.0,
            ReverbParameter::EarlyDiffusion
            | ReverbParameter::LateDiffusion
            | ReverbParameter::LowEqGain
            | ReverbParameter::HighEqGain => 8.0,
            ReverbParameter::LowEqCutoff | ReverbParameter::HighEqCutoff => 4.0,
            ReverbParameter::RoomFilterFrequency => 5000.0,
            ReverbParameter::RoomFilterMain
            | ReverbParameter::RoomFilterHighFrequency
            | ReverbParameter::ReflectionsGain
            | ReverbParameter::ReverbGain => 0.0,
            ReverbParameter::DecayTime => 1.0,
            ReverbParameter::Density | ReverbParameter::RoomSize => 100.0,
        }
    }

    /// The backend property this parameter drives. The rear delay and the position
    /// parameters have no backend counterpart.
    pub fn property(self) -> Option<ReverbProperty> {
        match self {
            ReverbParameter::WetDryMix => Some(ReverbProperty::WetDryMix),
            ReverbParameter::ReflectionsDelay => Some(ReverbProperty::ReflectionsDelay),
            ReverbParameter::ReverbDelay => Some(ReverbProperty::ReverbDelay),
            ReverbParameter::RearDelay
            | ReverbParameter::PositionLeft
            | ReverbParameter::PositionRight
            | ReverbParameter::PositionMatrixLeft
            | ReverbParameter::PositionMatrixRight => None,
            ReverbParameter::EarlyDiffusion => Some(ReverbProperty::EarlyDiffusion),
            ReverbParameter::LateDiffusion => Some(ReverbProperty::LateDiffusion),
            ReverbParameter::LowEqGain => Some(ReverbProperty::LowEqGain),
            ReverbParameter::LowEqCutoff => Some(ReverbProperty::LowEqCutoff),
            ReverbParameter::HighEqGain => Some(ReverbProperty::HighEqGain),
            ReverbParameter::HighEqCutoff => Some(ReverbProperty::HighEqCutoff),
            ReverbParameter::RoomFilterFrequency => Some(ReverbProperty::RoomFilterFrequency),
            ReverbParameter::RoomFilterMain => Some(ReverbProperty::RoomFilterMain),
            ReverbParameter::RoomFilterHighFrequency => {
                Some(ReverbProperty::RoomFilterHighFrequency)
            }
            ReverbParameter::ReflectionsGain => Some(ReverbProperty::ReflectionsGain),
            ReverbParameter::ReverbGain => Some(ReverbProperty::ReverbGain),
            ReverbParameter::DecayTime => Some(ReverbProperty::DecayTime),
            ReverbParameter::Density => Some(ReverbProperty::Density),
            ReverbParameter::RoomSize => Some(ReverbProperty::RoomSize),
        }
    }
}

/// A bounded DSP value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DspParameter {
    parameter: ReverbParameter,
    value: f32,
    min: f32,
    max: f32,
}

impl DspParameter {
    /// The parameter at its default value and bounds.
    pub fn new(parameter: ReverbParameter) -> DspParameter {
        let (min, max) = parameter.range();
        DspParameter {
            parameter,
            value: parameter.default_value(),
            min,
            max,
        }
    }

    pub fn parameter(&self) -> ReverbParameter {
        self.parameter
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Sets the value, clamping it to the bounds. NaN clamps to the minimum.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.max(self.min).min(self.max);
    }
}

pub struct DspPreset {
    name: String,
    device: Arc<AudioDevice>,
    /// `None` when the backend could not provide a reverb.
    reverb: Option<ReverbHandle>,
    parameters: Mutex<[DspParameter; REVERB_PARAMETER_COUNT]>,
}

impl DspPreset {
    /// Creates the preset and its backend reverb. Parameters not listed keep their
    /// defaults; listed values are clamped.
    pub fn new(
        device: Arc<AudioDevice>,
        name: &str,
        values: &[(ReverbParameter, f32)],
    ) -> Arc<DspPreset> {
        let mut parameters = ReverbParameter::ALL.map(DspParameter::new);
        for (parameter, value) in values {
            parameters[parameter.index()].set_value(*value);
        }

        let reverb = device.gen_reverb(parameters.map(|parameter| parameter.value()));
        if reverb.is_none() {
            warn!(preset = name, "Unable to generate a reverb, preset will be dry");
        }

        Arc::new(DspPreset {
            name: name.to_string(),
            device,
            reverb,
            parameters: Mutex::new(parameters),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reverb(&self) -> Option<ReverbHandle> {
        self.reverb
    }

    pub fn parameter(&self, index: usize) -> Result<DspParameter> {
        self.parameters
            .lock()
            .get(index)
            .copied()
            .ok_or(AudioError::DspParameterOutOfRange(index))
    }

    /// Current values in preset order.
    pub fn values(&self) -> [f32; REVERB_PARAMETER_COUNT] {
        self.parameters.lock().map(|parameter| parameter.value())
    }

    /// Clamps and stores a parameter, then forwards it to the backend reverb.
    pub fn set_parameter(&self, index: usize, value: f32) -> Result<()> {
        let mut parameters = self.parameters.lock();
        let parameter = parameters
            .get_mut(index)
            .ok_or(AudioError::DspParameterOutOfRange(index))?;
        parameter.set_value(value);

        let (Some(reverb), Some(property)) = (self.reverb, parameter.parameter().property())
        else {
            debug!(
                preset = %self.name,
                parameter = ?parameter.parameter(),
                "DSP parameter has no backend mapping"
            );
            return Ok(());
        };

        let backend = self.device.backend();
        backend.set_reverb_property(reverb, property, parameter.value());
        backend.commit_reverb_changes(reverb);
        Ok(())
    }
}

impl fmt::Debug for DspPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DspPreset")
            .field("name", &self.name)
            .field("reverb", &self.reverb)
            .finish()
    }
}

impl Drop for DspPreset {
    fn drop(&mut self) {
        if let Some(reverb) = self.reverb.take() {
            self.device.delete_reverb(reverb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::device::clock::ManualClock;

    fn preset(values: &[(ReverbParameter, f32)]) -> (Arc<DspPreset>, Arc<NullBackend>) {
        let backend = Arc::new(NullBackend::new());
        let device = AudioDevice::new(backend.clone(), Arc::new(ManualClock::new()));
        (DspPreset::new(device, "Hall", values), backend)
    }

    #[test]
    fn test_indices_are_stable() {
        for (index, parameter) in ReverbParameter::ALL.iter().enumerate() {
            assert_eq!(parameter.index(), index);
            assert_eq!(ReverbParameter::from_index(index), Some(*parameter));
        }
        assert_eq!(ReverbParameter::from_index(REVERB_PARAMETER_COUNT), None);
    }

    #[test]
    fn test_defaults_within_range() {
        for parameter in ReverbParameter::ALL {
            let (min, max) = parameter.range();
            let value = parameter.default_value();
            assert!(min <= value && value <= max, "{parameter:?}");
        }
    }

    #[test]
    fn test_reverb_created_with_clamped_values() {
        let (preset, backend) = preset(&[
            (ReverbParameter::RoomSize, 500.0),
            (ReverbParameter::WetDryMix, 40.0),
        ]);
        let record = backend.reverb(preset.reverb().unwrap()).unwrap();
        assert_eq!(record.parameters[ReverbParameter::RoomSize.index()], 100.0);
        assert_eq!(record.parameters[ReverbParameter::WetDryMix.index()], 40.0);
        assert_eq!(record.parameters[ReverbParameter::DecayTime.index()], 1.0);
    }

    #[test]
    fn test_set_parameter_clamps_and_commits() {
        let (preset, backend) = preset(&[]);
        let index = ReverbParameter::ReflectionsGain.index();

        preset.set_parameter(index, -500.0).unwrap();
        assert_eq!(preset.parameter(index).unwrap().value(), -100.0);

        let record = backend.reverb(preset.reverb().unwrap()).unwrap();
        assert_eq!(record.changes, vec![(ReverbProperty::ReflectionsGain, -100.0)]);
        assert_eq!(record.commits, 1);
    }

    #[test]
    fn test_unmapped_parameter_is_stored_only() {
        let (preset, backend) = preset(&[]);
        let index = ReverbParameter::PositionMatrixLeft.index();

        preset.set_parameter(index, 12.0).unwrap();
        assert_eq!(preset.values()[index], 12.0);

        let record = backend.reverb(preset.reverb().unwrap()).unwrap();
        assert!(record.changes.is_empty());
        assert_eq!(record.commits, 0);
    }

    #[test]
    fn test_out_of_range_index() {
        let (preset, _) = preset(&[]);
        assert!(matches!(
            preset.set_parameter(22, 1.0),
            Err(AudioError::DspParameterOutOfRange(22))
        ));
        assert!(matches!(
            preset.parameter(99),
            Err(AudioError::DspParameterOutOfRange(99))
        ));
    }

    #[test]
    fn test_parameter_clamping() {
        for parameter in ReverbParameter::ALL {
            let mut dsp = DspParameter::new(parameter);
            for value in [-1e9f32, -1.0, 0.0, 0.5, 50.0, 1e9] {
                dsp.set_value(value);
                assert_eq!(dsp.value(), value.clamp(dsp.min(), dsp.max()));
            }
        }
    }

    #[test]
    fn test_reverb_released_on_drop() {
        let (preset, backend) = preset(&[]);
        assert_eq!(backend.live_reverbs(), 1);
        drop(preset);
        assert_eq!(backend.live_reverbs(), 0);
    }
}
