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
use crate::backend::BackendError;
use crate::config::error::ConfigError;

use super::category::CrossfadeType;
use super::rpc::RpcParameter;

/// Errors raised by the cue runtime.
///
/// Authoring mistakes (unknown names, unsupported curve or crossfade kinds) surface
/// here and are propagated out of the update loop untouched. Running out of backend
/// voices is not an error; it is logged and the affected voice is dropped.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("variable not found: {name}")]
    VariableNotFound { name: String },

    #[error("variable is not writable: {name}")]
    VariableNotWritable { name: String },

    #[error("unsupported crossfade type: {0:?}")]
    UnsupportedCrossfade(CrossfadeType),

    #[error("unsupported RPC parameter: {0:?}")]
    UnsupportedRpcParameter(RpcParameter),

    #[error("DSP parameter index out of range: {0}")]
    DspParameterOutOfRange(usize),

    #[error("unknown cue: {0}")]
    UnknownCue(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown sound: {0}")]
    UnknownSound(String),

    #[error("unknown wave: {0}")]
    UnknownWave(String),

    #[error("unknown RPC: {0}")]
    UnknownRpc(String),

    #[error("unknown DSP preset: {0}")]
    UnknownDspPreset(String),

    #[error("cue has been disposed: {0}")]
    CueDisposed(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("sound bank error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
