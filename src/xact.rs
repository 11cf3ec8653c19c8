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

//! The cue runtime: variables, curves, DSP presets, sounds, categories and cues.

pub mod category;
pub mod cue;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod rpc;
pub mod snapshot;
pub mod sound;
pub mod variable;

pub use self::category::{AudioCategory, CategorySettings, CrossfadeType, MaxInstanceBehavior};
pub use self::cue::{Cue, CueDefinition, CueStatus, CueVariant, StopOptions};
pub use self::dsp::{DspParameter, DspPreset, ReverbParameter};
pub use self::engine::AudioRuntime;
pub use self::error::{AudioError, Result};
pub use self::rpc::{CurveType, Rpc, RpcParameter, RpcPoint};
pub use self::sound::{ClipDefinition, SoundDefinition};
pub use self::variable::Variable;
