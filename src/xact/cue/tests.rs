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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::backend::null::NullBackend;
use crate::backend::SourceState;
use crate::config::{
    BankConfig, CategoryConfig, ClipConfig, CueConfig, RpcConfig, SoundConfig, VariableConfig,
    VariantConfig,
};
use crate::testutil::{self, Runtime};
use crate::xact::category::{CategorySettings, CrossfadeType, DEFAULT_CATEGORY};
use crate::xact::rpc::{Rpc, RpcPoint};
use crate::xact::sound::ClipDefinition;

const NOW: Duration = Duration::ZERO;

fn bank(
    variables: Vec<VariableConfig>,
    categories: Vec<CategoryConfig>,
    rpcs: Vec<RpcConfig>,
    sounds: Vec<SoundConfig>,
    cues: Vec<CueConfig>,
) -> BankConfig {
    BankConfig::new(variables, categories, rpcs, Vec::new(), sounds, cues)
}

fn source_state(runtime: &Runtime, cue: &Cue) -> Vec<SourceState> {
    cue.voice_sources()
        .into_iter()
        .filter_map(|source| runtime.backend.source(source))
        .map(|record| record.state)
        .collect()
}

/// Asserts the category never exceeds its limit and its per-name counts match its
/// active list.
fn assert_category_consistent(category: &AudioCategory) {
    let cues = category.active_cues();
    assert!(cues.len() <= category.settings().max_instances);
    for cue in &cues {
        let expected = cues.iter().filter(|other| other.name() == cue.name()).count();
        assert_eq!(category.instance_count(cue.name()), expected, "count of {}", cue.name());
    }
}

#[test]
fn test_replace_oldest_keeps_newest() {
    let runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::ReplaceOldest,
        1,
        "0s",
        "0s",
    ));
    let category = runtime.category("Limited").unwrap();

    let first = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);
    assert_eq!(runtime.backend.live_sources(), 1);

    let second = runtime.play_cue("explosion").unwrap();
    let active = category.active_cues();
    assert_eq!(active.len(), 1);
    assert!(Arc::ptr_eq(&active[0], &second));
    assert_eq!(first.status(), CueStatus::Disposed);
    assert_eq!(first.last_stop_options(), Some(StopOptions::AsAuthored));
    assert_eq!(second.status(), CueStatus::Queued);
    assert_eq!(runtime.backend.live_sources(), 0);

    runtime.tick(NOW);
    assert_eq!(second.status(), CueStatus::Playing);
    assert_eq!(runtime.backend.live_sources(), 1);
}

#[test]
fn test_queue_crossfades_to_new_cue() {
    let runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::Queue,
        1,
        "1s",
        "1s",
    ));
    let category = runtime.category("Limited").unwrap();

    let music_a = runtime.get_cue("music_a").unwrap();
    music_a.play().unwrap();
    runtime.tick(NOW);
    assert_eq!(music_a.status(), CueStatus::Playing);

    let music_b = runtime.get_cue("music_b").unwrap();
    music_b.play().unwrap();
    assert_eq!(music_b.get_variable(VOLUME).unwrap(), 0.0);
    assert!(category.is_fading());
    assert_eq!(category.active_count(), 2);

    runtime.tick(Duration::from_millis(500));
    assert_eq!(music_a.volume(), 0.5);
    assert_eq!(music_b.volume(), 0.5);
    let source = music_b.voice_sources()[0];
    assert_eq!(runtime.backend.source(source).unwrap().volume, 0.5);

    runtime.tick(Duration::from_millis(500));
    assert_eq!(music_a.status(), CueStatus::Stopped);
    assert_eq!(music_b.volume(), category.volume());
    assert!(!category.is_fading());
    let active = category.active_cues();
    assert_eq!(active.len(), 1);
    assert!(Arc::ptr_eq(&active[0], &music_b));
    assert_eq!(runtime.backend.live_sources(), 1);
}

#[test]
fn test_cue_instance_limit_fail_is_noop() {
    let runtime = Runtime::new(&bank(
        Vec::new(),
        vec![CategoryConfig::new("Effects", 255, MaxInstanceBehavior::Fail)],
        Vec::new(),
        vec![SoundConfig::new("boom", vec![ClipConfig::new("boom")])],
        vec![CueConfig::new(
            "explosion",
            "Effects",
            vec![VariantConfig::weighted("boom", 1.0)],
        )
        .with_instance_limit(1, MaxInstanceBehavior::Fail)],
    ));
    let category = runtime.category("Effects").unwrap();

    let first = runtime.play_cue("explosion").unwrap();
    let second = runtime.play_cue("explosion").unwrap();
    assert_eq!(category.active_count(), 1);
    assert_eq!(first.status(), CueStatus::Queued);
    assert_eq!(second.status(), CueStatus::Created);
    assert_eq!(second.voice_count(), 0);

    runtime.tick(NOW);
    assert_eq!(runtime.backend.live_sources(), 1);
}

#[test]
fn test_cue_instance_limit_queue_crossfades() {
    let runtime = Runtime::new(&bank(
        Vec::new(),
        vec![CategoryConfig::new("Music", 255, MaxInstanceBehavior::Fail).with_fades("1s", "1s")],
        Vec::new(),
        vec![SoundConfig::new("theme", vec![ClipConfig::new("theme").with_looped(true)])],
        vec![CueConfig::new(
            "music",
            "Music",
            vec![VariantConfig::weighted("theme", 1.0)],
        )
        .with_instance_limit(1, MaxInstanceBehavior::Queue)],
    ));
    let category = runtime.category("Music").unwrap();

    let old = runtime.get_cue("music").unwrap();
    old.play().unwrap();
    runtime.tick(NOW);

    let new = runtime.get_cue("music").unwrap();
    new.play().unwrap();
    assert_eq!(new.volume(), 0.0);
    assert!(category.is_fading());

    runtime.tick(Duration::from_secs(1));
    assert_eq!(old.status(), CueStatus::Stopped);
    assert_eq!(new.volume(), 1.0);
    assert_eq!(category.instance_count("music"), 1);
}

#[test]
fn test_rpc_volume_curve() {
    let runtime = Runtime::new(&bank(
        Vec::new(),
        Vec::new(),
        vec![RpcConfig::new(
            "Attenuation",
            "Speed",
            RpcParameter::Volume,
            vec![
                RpcPoint::linear(0.0, 0.0),
                RpcPoint::linear(50.0, -10.0),
                RpcPoint::linear(100.0, 0.0),
            ],
        )],
        vec![SoundConfig::new("boom", vec![ClipConfig::new("boom")]).with_rpcs(&["Attenuation"])],
        vec![CueConfig::new(
            "explosion",
            DEFAULT_CATEGORY,
            vec![VariantConfig::weighted("boom", 1.0)],
        )
        .with_variables(vec![VariableConfig::new("Speed", 0.0, 0.0, 100.0)])],
    ));

    let cue = runtime.get_cue("explosion").unwrap();
    cue.set_variable("Speed", 50.0).unwrap();
    cue.play().unwrap();
    runtime.tick(NOW);

    let source = cue.voice_sources()[0];
    let volume = runtime.backend.source(source).unwrap().volume;
    assert!((volume - 0.316_227_8).abs() < 1e-5, "volume {volume}");

    cue.set_variable("Speed", 100.0).unwrap();
    runtime.tick(NOW);
    assert_eq!(runtime.backend.source(source).unwrap().volume, 1.0);
}

#[test]
fn test_rpc_pitch_curve() {
    let runtime = Runtime::new(&bank(
        Vec::new(),
        Vec::new(),
        vec![RpcConfig::new(
            "Rev",
            "Rpm",
            RpcParameter::Pitch,
            vec![RpcPoint::linear(0.0, 0.0), RpcPoint::linear(100.0, 1000.0)],
        )],
        vec![SoundConfig::new("engine", vec![ClipConfig::new("engine")]).with_rpcs(&["Rev"])],
        vec![CueConfig::new(
            "car",
            DEFAULT_CATEGORY,
            vec![VariantConfig::weighted("engine", 1.0)],
        )
        .with_variables(vec![VariableConfig::new("Rpm", 50.0, 0.0, 100.0)])],
    ));

    let cue = runtime.play_cue("car").unwrap();
    runtime.tick(NOW);
    let source = cue.voice_sources()[0];
    assert_eq!(runtime.backend.source(source).unwrap().pitch, 0.5);
}

#[test]
fn test_weighted_boundaries() {
    assert_eq!(select_weighted(&[1.0, 1.0], 0.0), Some(0));
    assert_eq!(select_weighted(&[1.0, 1.0], 1.0), Some(0));
    assert_eq!(select_weighted(&[1.0, 1.0], 1.5), Some(1));
    assert_eq!(select_weighted(&[0.0, 2.0], 0.0), Some(1));
    assert_eq!(select_weighted(&[0.0, 0.0], 0.0), None);
    assert_eq!(select_weighted(&[], 0.0), None);
}

#[test]
fn test_weighted_distribution() {
    let weights = [1.0, 0.0, 3.0];
    let total: f32 = weights.iter().sum();
    let mut rng = StdRng::seed_from_u64(testutil::SEED);
    let mut counts = [0usize; 3];
    let trials = 40_000;
    for _ in 0..trials {
        let draw = rng.gen::<f32>() * total;
        counts[select_weighted(&weights, draw).unwrap()] += 1;
    }

    assert_eq!(counts[1], 0);
    let share = counts[0] as f32 / trials as f32;
    assert!((share - 0.25).abs() < 0.02, "share {share}");
}

#[test]
fn test_controlled_selection() {
    let sound = |name: &str| {
        Arc::new(SoundDefinition::new(name, 1.0, 0.0, Vec::new(), Vec::new(), None))
    };
    let variants = vec![
        CueVariant {
            sound: sound("grass"),
            min: 0.0,
            max: 0.5,
        },
        CueVariant {
            sound: sound("stone"),
            min: 0.5,
            max: 2.0,
        },
    ];
    assert_eq!(select_controlled(&variants, 0.25), Some(0));
    assert_eq!(select_controlled(&variants, 0.5), Some(0));
    assert_eq!(select_controlled(&variants, 1.0), Some(1));
    assert_eq!(select_controlled(&variants, 3.0), None);
}

#[test]
fn test_user_control_switches_sound() {
    let runtime = Runtime::new(&bank(
        vec![VariableConfig::new("Surface", 0.0, 0.0, 3.0)],
        Vec::new(),
        Vec::new(),
        vec![
            SoundConfig::new("step_grass", vec![ClipConfig::new("grass")]),
            SoundConfig::new("step_stone", vec![ClipConfig::new("stone")]),
        ],
        vec![CueConfig::new(
            "footstep",
            DEFAULT_CATEGORY,
            vec![
                VariantConfig::ranged("step_grass", 0.0, 0.5),
                VariantConfig::ranged("step_stone", 0.5, 2.0),
            ],
        )
        .with_user_control("Surface")],
    ));
    let category = runtime.category(DEFAULT_CATEGORY).unwrap();

    let cue = runtime.get_cue("footstep").unwrap();
    cue.play().unwrap();
    runtime.tick(NOW);
    assert_eq!(cue.active_sound().as_deref(), Some("step_grass"));
    let grass = cue.voice_sources()[0];

    runtime.set_global_variable("Surface", 1.0).unwrap();
    runtime.tick(NOW);
    assert_eq!(cue.active_sound().as_deref(), Some("step_stone"));
    assert!(runtime.backend.source(grass).is_none());
    assert_eq!(runtime.backend.playing_sources(), 1);

    // Nothing matches, but the cue keeps playing.
    runtime.set_global_variable("Surface", 3.0).unwrap();
    runtime.tick(NOW);
    assert_eq!(cue.active_sound(), None);
    assert_eq!(cue.voice_count(), 0);
    assert_eq!(cue.status(), CueStatus::Playing);
    assert_eq!(category.active_count(), 1);
    assert_eq!(runtime.backend.live_sources(), 0);
}

#[test]
fn test_positional_cue_tracks_emitter() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let listener = AudioListener::new();
    let emitter = AudioEmitter::new();
    emitter.set_position(Vec3::new(3.0, 4.0, 0.0));

    let cue = runtime.get_cue("explosion").unwrap();
    cue.apply_3d(&listener, &emitter);
    assert_eq!(cue.get_variable(DISTANCE).unwrap(), 5.0);
    cue.play().unwrap();
    runtime.tick(NOW);
    let source = cue.voice_sources()[0];

    emitter.set_position(Vec3::new(0.0, 0.0, -10.0));
    runtime.tick(NOW);
    assert_eq!(cue.get_variable(DISTANCE).unwrap(), 10.0);
    let position = runtime.backend.source(source).unwrap().position.unwrap();
    assert!(position.abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-5), "{position}");
}

#[test]
fn test_start_delay_defers_voice() {
    let runtime = Runtime::new(&bank(
        Vec::new(),
        Vec::new(),
        Vec::new(),
        vec![SoundConfig::new("boom", vec![ClipConfig::new("boom").with_delay("20ms")])],
        vec![CueConfig::new(
            "explosion",
            DEFAULT_CATEGORY,
            vec![VariantConfig::weighted("boom", 1.0)],
        )],
    ));

    let cue = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);
    assert_eq!(cue.status(), CueStatus::Playing);
    assert_eq!(cue.voice_count(), 1);
    assert_eq!(runtime.backend.live_sources(), 0);

    runtime.tick(Duration::from_millis(10));
    assert_eq!(runtime.backend.live_sources(), 0);

    runtime.tick(Duration::from_millis(10));
    assert_eq!(runtime.backend.playing_sources(), 1);
}

#[test]
fn test_pause_and_resume() {
    let runtime = Runtime::new(&testutil::effects_bank());

    let cue = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);
    cue.pause();
    assert!(cue.is_paused());
    assert_eq!(source_state(&runtime, &cue), vec![SourceState::Paused]);
    cue.resume();
    assert_eq!(source_state(&runtime, &cue), vec![SourceState::Playing]);

    // Paused before its voices start.
    let queued = runtime.play_cue("explosion").unwrap();
    queued.pause();
    runtime.tick(NOW);
    assert_eq!(source_state(&runtime, &queued), vec![SourceState::Paused]);
}

#[test]
fn test_stop_while_queued() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let category = runtime.category("Effects").unwrap();

    let cue = runtime.get_cue("explosion").unwrap();
    cue.play().unwrap();
    cue.stop(StopOptions::Immediate);
    assert_eq!(cue.status(), CueStatus::Stopped);
    assert_eq!(cue.last_stop_options(), Some(StopOptions::Immediate));
    assert_eq!(category.active_count(), 0);
    runtime.tick(NOW);
    assert_eq!(runtime.backend.live_sources(), 0);

    cue.play().unwrap();
    runtime.tick(NOW);
    assert_eq!(cue.status(), CueStatus::Playing);
    assert_eq!(cue.last_stop_options(), None);
    assert_eq!(runtime.backend.live_sources(), 1);
}

#[test]
fn test_finished_cues_leave_category() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let category = runtime.category("Effects").unwrap();

    let managed = runtime.play_cue("explosion").unwrap();
    let owned = runtime.get_cue("explosion").unwrap();
    owned.play().unwrap();
    runtime.tick(NOW);
    assert_eq!(category.active_count(), 2);

    for cue in [&managed, &owned] {
        let source = cue.voice_sources()[0];
        runtime.backend.finish_source(source);
    }
    runtime.tick(NOW);
    assert_eq!(category.active_count(), 0);
    assert_eq!(runtime.backend.live_sources(), 0);

    assert_eq!(managed.status(), CueStatus::Disposed);
    assert!(matches!(managed.play(), Err(AudioError::CueDisposed(name)) if name == "explosion"));
    assert_eq!(owned.status(), CueStatus::Stopped);
    owned.play().unwrap();
    assert_eq!(category.active_count(), 1);
}

#[test]
fn test_dispose_stops_cue() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cue = runtime.get_cue("explosion").unwrap();
    cue.play().unwrap();
    runtime.tick(NOW);

    cue.dispose();
    assert_eq!(cue.status(), CueStatus::Disposed);
    assert_eq!(runtime.backend.live_sources(), 0);
    assert_eq!(runtime.category("Effects").unwrap().active_count(), 0);
}

#[test]
fn test_variable_access() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cue = runtime.get_cue("explosion").unwrap();

    assert_eq!(cue.get_variable(VOLUME).unwrap(), 1.0);
    cue.set_variable(VOLUME, 0.25).unwrap();
    assert_eq!(cue.volume(), 0.25);
    assert!(matches!(
        cue.get_variable("Nope"),
        Err(AudioError::VariableNotFound { name }) if name == "Nope"
    ));
    assert!(matches!(
        cue.set_variable("Nope", 1.0),
        Err(AudioError::VariableNotFound { .. })
    ));
    assert!(matches!(
        cue.set_variable(NUM_CUE_INSTANCES, 4.0),
        Err(AudioError::VariableNotWritable { name }) if name == NUM_CUE_INSTANCES
    ));
}

#[test]
fn test_internal_writes_ignore_read_only() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cue = runtime.get_cue("explosion").unwrap();

    cue.lock().set_internal(DISTANCE, 12.0);
    cue.lock().set_internal(NUM_CUE_INSTANCES, 2.0);
    assert_eq!(cue.get_variable(DISTANCE).unwrap(), 12.0);
    assert_eq!(cue.get_variable(NUM_CUE_INSTANCES).unwrap(), 2.0);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "cue has no variable named Nope")]
fn test_internal_write_to_unknown_variable_panics() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cue = runtime.get_cue("explosion").unwrap();
    cue.lock().set_internal("Nope", 1.0);
}

#[test]
fn test_instance_counts_reach_cues() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cues: Vec<_> = (0..3)
        .map(|_| runtime.play_cue("explosion").unwrap())
        .collect();
    runtime.tick(NOW);
    for cue in &cues {
        assert_eq!(cue.get_variable(NUM_CUE_INSTANCES).unwrap(), 3.0);
    }
}

#[test]
fn test_replace_quietest() {
    let runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::ReplaceQuietest,
        2,
        "0s",
        "0s",
    ));
    let category = runtime.category("Limited").unwrap();

    let quiet = runtime.get_cue("music_a").unwrap();
    quiet.set_variable(VOLUME, 0.2).unwrap();
    quiet.play().unwrap();
    let loud = runtime.play_cue("explosion").unwrap();
    let incoming = runtime.play_cue("music_b").unwrap();

    assert_eq!(quiet.status(), CueStatus::Stopped);
    let active = category.active_cues();
    assert_eq!(active.len(), 2);
    assert!(Arc::ptr_eq(&active[0], &loud));
    assert!(Arc::ptr_eq(&active[1], &incoming));
}

#[test]
fn test_category_fail_respects_capacity() {
    let runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::Fail,
        3,
        "0s",
        "0s",
    ));
    let category = runtime.category("Limited").unwrap();
    let names = ["explosion", "music_a", "music_b"];
    let mut rng = StdRng::seed_from_u64(testutil::SEED);
    let mut cues: Vec<Arc<Cue>> = Vec::new();

    for _ in 0..500 {
        match rng.gen_range(0..4) {
            0 | 1 => {
                let cue = runtime.get_cue(names[rng.gen_range(0..names.len())]).unwrap();
                cue.play().unwrap();
                cues.push(cue);
            }
            2 if !cues.is_empty() => {
                let cue = cues.swap_remove(rng.gen_range(0..cues.len()));
                cue.stop(StopOptions::AsAuthored);
            }
            _ => runtime.tick(NOW),
        }
        assert_category_consistent(&category);
    }
}

#[test]
fn test_category_volume_reaches_voices() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let category = runtime.category("Effects").unwrap();
    let cue = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);

    category.set_volume(0.5);
    assert_eq!(cue.volume(), 0.5);
    runtime.tick(NOW);
    let source = cue.voice_sources()[0];
    assert_eq!(runtime.backend.source(source).unwrap().volume, 0.5);
}

#[test]
fn test_category_stop_and_pause() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let category = runtime.category("Effects").unwrap();
    let first = runtime.play_cue("explosion").unwrap();
    let second = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);

    category.pause();
    assert_eq!(runtime.backend.playing_sources(), 0);
    category.resume();
    assert_eq!(runtime.backend.playing_sources(), 2);

    category.stop(StopOptions::Immediate);
    assert_eq!(category.active_count(), 0);
    assert_eq!(first.last_stop_options(), Some(StopOptions::Immediate));
    assert_eq!(second.status(), CueStatus::Disposed);
    assert_eq!(runtime.backend.live_sources(), 0);
}

#[test]
fn test_exhausted_backend_drops_voices() {
    let runtime = Runtime::with_backend(&testutil::effects_bank(), NullBackend::with_voice_limit(1));

    let first = runtime.play_cue("explosion").unwrap();
    let second = runtime.play_cue("explosion").unwrap();
    runtime.tick(NOW);

    assert_eq!(first.voice_count(), 1);
    assert_eq!(second.voice_count(), 0);
    assert_eq!(second.status(), CueStatus::Disposed);
    assert_eq!(runtime.category("Effects").unwrap().active_count(), 1);
}

#[test]
fn test_unsupported_crossfade_fails_update() {
    let mut runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::Queue,
        1,
        "1s",
        "1s",
    ));
    let mut settings = CategorySettings::new("Limited");
    settings.max_instances = 1;
    settings.behavior = MaxInstanceBehavior::Queue;
    settings.fade_in = Duration::from_secs(1);
    settings.fade_out = Duration::from_secs(1);
    settings.crossfade = CrossfadeType::EqualPower;
    runtime.add_category(settings);

    runtime.play_cue("music_a").unwrap();
    runtime.play_cue("music_b").unwrap();
    assert!(matches!(
        runtime.update(),
        Err(AudioError::UnsupportedCrossfade(CrossfadeType::EqualPower))
    ));
}

#[test]
fn test_unsupported_rpc_parameter_fails_update() {
    let mut runtime = Runtime::new(&testutil::effects_bank());
    let send = Arc::new(Rpc::new(
        "Send",
        VOLUME,
        RpcParameter::ReverbSend,
        vec![RpcPoint::linear(0.0, 0.0), RpcPoint::linear(1.0, 1.0)],
    ));
    let sound = runtime.add_sound(SoundDefinition::new(
        "wet",
        1.0,
        0.0,
        vec![ClipDefinition::new("boom")],
        vec![send],
        None,
    ));
    runtime.add_cue(CueDefinition::new(
        "splash",
        "Effects",
        vec![CueVariant {
            sound,
            min: 0.0,
            max: 1.0,
        }],
        255,
        MaxInstanceBehavior::Fail,
        None,
        Vec::new(),
    ));

    runtime.play_cue("splash").unwrap();
    assert!(matches!(
        runtime.update(),
        Err(AudioError::UnsupportedRpcParameter(RpcParameter::ReverbSend))
    ));
}

#[test]
fn test_stop_from_another_thread() {
    let runtime = Runtime::new(&testutil::effects_bank());
    let cue = runtime.get_cue("explosion").unwrap();
    cue.play().unwrap();
    runtime.tick(NOW);

    // Releasing the voice needs the main thread, which keeps updating meanwhile.
    let stopper = {
        let cue = cue.clone();
        thread::spawn(move || cue.stop(StopOptions::AsAuthored))
    };
    testutil::eventually(
        || {
            runtime.update().unwrap();
            cue.status() == CueStatus::Stopped
        },
        "cue was never stopped",
    );
    stopper.join().unwrap();
    testutil::eventually(
        || {
            runtime.update().unwrap();
            runtime.backend.live_sources() == 0
        },
        "voice was never released",
    );
}

#[test]
fn test_concurrent_play_and_stop() {
    let runtime = Runtime::new(&testutil::limited_bank(
        MaxInstanceBehavior::ReplaceOldest,
        4,
        "0s",
        "0s",
    ));
    let workers = 4;
    let done = AtomicUsize::new(0);

    thread::scope(|scope| {
        for worker in 0..workers {
            let runtime = &runtime;
            let done = &done;
            scope.spawn(move || {
                for i in 0..50 {
                    let name = if (worker + i) % 2 == 0 {
                        "explosion"
                    } else {
                        "music_a"
                    };
                    let cue = runtime.get_cue(name).unwrap();
                    cue.play().unwrap();
                    cue.set_variable(VOLUME, 0.5).unwrap();
                    if i % 3 == 0 {
                        cue.stop(StopOptions::Immediate);
                    }
                }
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        while done.load(Ordering::SeqCst) < workers {
            runtime.update().unwrap();
        }
    });

    runtime.tick(NOW);
    let category = runtime.category("Limited").unwrap();
    assert_category_consistent(&category);
    assert!(category.active_count() > 0);
    assert_eq!(runtime.backend.live_sources(), category.active_count());
}
