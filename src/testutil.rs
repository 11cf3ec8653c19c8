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
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::null::NullBackend;
use crate::config::{
    BankConfig, CategoryConfig, ClipConfig, CueConfig, RuntimeConfig, SoundConfig, VariantConfig,
};
use crate::device::clock::ManualClock;
use crate::instance::WaveData;
use crate::xact::category::MaxInstanceBehavior;
use crate::xact::AudioRuntime;

/// Seed used by every test runtime.
pub const SEED: u64 = 7;

/// A runtime on a null backend and a manual clock, with silent waves loaded for
/// every wave its bank references.
pub struct Runtime {
    runtime: AudioRuntime,
    pub backend: Arc<NullBackend>,
    pub clock: Arc<ManualClock>,
}

impl Runtime {
    pub fn new(bank: &BankConfig) -> Runtime {
        Self::with_backend(bank, NullBackend::new())
    }

    pub fn with_backend(bank: &BankConfig, backend: NullBackend) -> Runtime {
        let backend = Arc::new(backend);
        let clock = Arc::new(ManualClock::new());
        let config = RuntimeConfig::default().with_random_seed(SEED);
        let mut runtime =
            AudioRuntime::with_clock(&config, Some(backend.clone()), clock.clone()).unwrap();
        runtime.load_bank(bank).unwrap();
        for wave in bank.wave_names() {
            runtime
                .load_wave(&wave, &WaveData::silence(Duration::from_millis(100), 44100, 1))
                .unwrap();
        }
        Runtime {
            runtime,
            backend,
            clock,
        }
    }

    /// Advances the clock, then runs one update.
    pub fn tick(&self, by: Duration) {
        self.clock.advance(by);
        self.runtime.update().unwrap();
    }
}

impl Deref for Runtime {
    type Target = AudioRuntime;

    fn deref(&self) -> &AudioRuntime {
        &self.runtime
    }
}

impl DerefMut for Runtime {
    fn deref_mut(&mut self) -> &mut AudioRuntime {
        &mut self.runtime
    }
}

/// One "Effects" category with room for everything and an "explosion" cue.
pub fn effects_bank() -> BankConfig {
    BankConfig::new(
        Vec::new(),
        vec![CategoryConfig::new("Effects", 255, MaxInstanceBehavior::Fail)],
        Vec::new(),
        Vec::new(),
        vec![SoundConfig::new("boom", vec![ClipConfig::new("boom")])],
        vec![CueConfig::new(
            "explosion",
            "Effects",
            vec![VariantConfig::weighted("boom", 1.0)],
        )],
    )
}

/// A "Limited" category holding "explosion", "music_a" and "music_b".
pub fn limited_bank(
    behavior: MaxInstanceBehavior,
    max_instances: usize,
    fade_in: &str,
    fade_out: &str,
) -> BankConfig {
    BankConfig::new(
        Vec::new(),
        vec![CategoryConfig::new("Limited", max_instances, behavior).with_fades(fade_in, fade_out)],
        Vec::new(),
        Vec::new(),
        vec![
            SoundConfig::new("boom", vec![ClipConfig::new("boom")]),
            SoundConfig::new("theme_a", vec![ClipConfig::new("theme_a").with_looped(true)]),
            SoundConfig::new("theme_b", vec![ClipConfig::new("theme_b").with_looped(true)]),
        ],
        vec![
            CueConfig::new(
                "explosion",
                "Limited",
                vec![VariantConfig::weighted("boom", 1.0)],
            ),
            CueConfig::new(
                "music_a",
                "Limited",
                vec![VariantConfig::weighted("theme_a", 1.0)],
            ),
            CueConfig::new(
                "music_b",
                "Limited",
                vec![VariantConfig::weighted("theme_b", 1.0)],
            ),
        ],
    )
}

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}
