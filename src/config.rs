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

//! YAML configuration: the runtime settings and the authored sound banks.

mod bank;
pub mod error;
mod runtime;

pub use self::bank::{
    BankConfig, CategoryConfig, ClipConfig, CueConfig, DspPresetConfig, FilterConfig, RpcConfig,
    SoundConfig, VariableConfig, VariantConfig,
};
pub use self::runtime::RuntimeConfig;

use std::time::Duration;

use duration_string::DurationString;

use self::error::ConfigError;

/// Parses a duration string such as `16ms` or `1s`.
pub(crate) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::Duration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
