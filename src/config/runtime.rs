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
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use super::error::ConfigError;
use super::parse_duration;

const DEFAULT_MASTER_VOLUME: f32 = 1.0;
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Prefix of the environment variables that override the runtime configuration.
pub const ENV_PREFIX: &str = "CUEMIX";

/// A YAML representation of the runtime configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// The audio device to open. The backend's default device when unset.
    device: Option<String>,

    /// Run without a real backend.
    #[serde(default)]
    null_device: bool,

    /// Multiplied into every voice's gain (default: 1.0).
    master_volume: Option<f32>,

    /// How often the engine is updated (default: 16ms).
    tick_interval: Option<String>,

    /// Seed for variant selection. Seeded from entropy when unset.
    random_seed: Option<u64>,
}

impl RuntimeConfig {
    /// Creates a new runtime configuration.
    pub fn new(device: Option<&str>, null_device: bool) -> RuntimeConfig {
        RuntimeConfig {
            device: device.map(str::to_string),
            null_device,
            ..Default::default()
        }
    }

    /// Loads the runtime configuration from an optional YAML file, overridden by
    /// `CUEMIX_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<RuntimeConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<RuntimeConfig>()?)
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> RuntimeConfig {
        self.random_seed = Some(seed);
        self
    }

    /// Sets the master volume.
    pub fn with_master_volume(mut self, volume: f32) -> RuntimeConfig {
        self.master_volume = Some(volume);
        self
    }

    /// Returns the configured device name.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns true if the runtime should run without a real backend.
    pub fn null_device(&self) -> bool {
        self.null_device
    }

    /// Returns the master volume (default: 1.0).
    pub fn master_volume(&self) -> f32 {
        self.master_volume.unwrap_or(DEFAULT_MASTER_VOLUME).max(0.0)
    }

    /// Returns the update interval (default: 16ms).
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        match &self.tick_interval {
            Some(interval) => parse_duration(interval),
            None => Ok(DEFAULT_TICK_INTERVAL),
        }
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }
}
