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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use cuemix::backend::null::NullBackend;
use cuemix::backend::Backend;
use cuemix::config::{BankConfig, RuntimeConfig};
use cuemix::device::clock::{Clock, ManualClock, SystemClock};
use cuemix::instance::WaveData;
use cuemix::AudioRuntime;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Length of the silent stand-in loaded for every wave a bank references.
const PLACEHOLDER_WAVE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A cue-based interactive audio runtime."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Loads and validates a sound bank.
    Validate {
        /// The path to the sound bank.
        bank_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Plays cues from a bank against the null device and prints the resulting state.
    Simulate {
        /// The path to the sound bank.
        bank_path: String,
        /// The cues to play, in order.
        cues: Vec<String>,
        /// The path to the runtime config.
        #[arg(short, long)]
        config: Option<String>,
        /// The number of update ticks to run.
        #[arg(short, long, default_value_t = 60)]
        ticks: u32,
        /// Run the ticks in real time instead of advancing a simulated clock.
        #[arg(short, long)]
        realtime: bool,
        /// Print the final state as JSON.
        #[arg(short, long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { bank_path } => {
            let bank = BankConfig::deserialize(&PathBuf::from(&bank_path))?;
            bank.validate()?;

            println!("Bank {} is valid:", bank_path);
            println!("- {} global variables", bank.variables().len());
            println!("- {} categories", bank.categories().len());
            println!("- {} RPCs", bank.rpcs().len());
            println!("- {} DSP presets", bank.dsp_presets().len());
            println!("- {} sounds", bank.sounds().len());
            println!("- {} cues", bank.cues().len());

            println!("\nWaves (count: {}):", bank.wave_names().len());
            for wave in bank.wave_names() {
                println!("- {}", wave);
            }
        }
        Commands::Devices {} => {
            let backend = NullBackend::new();
            let devices = backend.devices();

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Simulate {
            bank_path,
            cues,
            config,
            ticks,
            realtime,
            json,
        } => simulate(&bank_path, &cues, config.as_deref(), ticks, realtime, json)?,
    }

    Ok(())
}

fn simulate(
    bank_path: &str,
    cues: &[String],
    config_path: Option<&str>,
    ticks: u32,
    realtime: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let bank = BankConfig::deserialize(&PathBuf::from(bank_path))?;
    let config = RuntimeConfig::load(config_path.map(Path::new))?;

    let manual = Arc::new(ManualClock::new());
    let clock: Arc<dyn Clock> = if realtime {
        Arc::new(SystemClock::new())
    } else {
        manual.clone()
    };

    let mut runtime = AudioRuntime::with_clock(&config, None, clock)?;
    runtime.load_bank(&bank)?;
    for wave in bank.wave_names() {
        runtime.load_wave(&wave, &WaveData::silence(PLACEHOLDER_WAVE, 44100, 2))?;
    }

    for cue in cues {
        runtime.play_cue(cue)?;
    }

    let interval = runtime.tick_interval();
    info!(ticks, interval = ?interval, realtime, "Running simulation");
    for _ in 0..ticks {
        let started = Instant::now();
        runtime.update()?;
        if realtime {
            spin_sleep::sleep(interval.saturating_sub(started.elapsed()));
        } else {
            manual.advance(interval);
        }
    }

    let snapshot = runtime.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Master volume: {}", snapshot.master_volume);
    println!("Active instances: {}", snapshot.active_instances);
    if !snapshot.globals.is_empty() {
        println!("\nGlobals:");
        for global in &snapshot.globals {
            println!("- {} = {}", global.name(), global.value());
        }
    }
    println!("\nCategories:");
    for category in &snapshot.categories {
        println!(
            "- {} (volume {}, {} cues{}{})",
            category.name,
            category.volume,
            category.cues.len(),
            if category.paused { ", paused" } else { "" },
            if category.fading { ", fading" } else { "" },
        );
        for cue in &category.cues {
            println!(
                "  - {}: {:?}, sound {}, {} voices, volume {}",
                cue.name,
                cue.status,
                cue.sound.as_deref().unwrap_or("none"),
                cue.voices,
                cue.volume,
            );
        }
    }

    Ok(())
}
