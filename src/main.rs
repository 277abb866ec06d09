// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use metronome::audio::{output_devices, AudioEngine};
use metronome::config::{MetronomeConfig, PolicyChoice};
use metronome::control::KeyboardController;
use metronome::ui::App;
use metronome::{BeatFanout, BeatLog, BeatScheduler, MetronomeHandle, TimingSource, WallClock};

/// Metronome with a drift-free beat scheduler
#[derive(Debug, Parser)]
#[command(name = "metronome", version, about)]
struct Cli {
    /// Configuration file (.yaml, .yml or .toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Starting tempo, overriding the configuration
    #[arg(long, global = true)]
    bpm: Option<u32>,

    /// Scheduling policy: auto, lookahead or wall_clock
    #[arg(long, global = true)]
    policy: Option<PolicyChoice>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Interactive terminal metronome (default)
    Tui,
    /// Play without a UI, logging every beat
    Headless {
        /// How long to play
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },
    /// List audio output devices
    Devices,
    /// Validate a configuration file
    CheckConfig { path: PathBuf },
    /// Print the effective configuration
    PrintConfig {
        /// Print TOML instead of YAML
        #[arg(long)]
        toml: bool,
    },
}

fn init_logging(tui: bool) {
    // The alternate screen hides stderr, so the TUI stays quiet unless asked
    let default = if tui { "off" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<MetronomeConfig> {
    let mut config = match &cli.config {
        Some(path) => MetronomeConfig::load(path)?,
        None => MetronomeConfig::default(),
    };
    if let Some(bpm) = cli.bpm {
        config.tempo.start_bpm = bpm;
    }
    if let Some(policy) = cli.policy {
        config.scheduling.policy = policy;
    }
    config.validate().context("Invalid command line override")?;
    Ok(config)
}

/// Start the audio engine and the transport.
///
/// Audio is optional: without an output device the metronome keeps time on
/// the wall clock and only the UI or log shows the beats.
fn start(
    config: &MetronomeConfig,
    log_beats: bool,
) -> (MetronomeHandle, Option<AudioEngine>) {
    let mut engine = AudioEngine::new(
        config.audio.clone(),
        &config.click,
        config.scheduling.tracks,
    );
    let mut sinks = BeatFanout::new();

    let (clock, engine) = match engine.start() {
        Ok(()) => {
            sinks.push(engine.sink());
            let clock: Box<dyn TimingSource> = Box::new(engine.clock());
            (clock, Some(engine))
        }
        Err(err) => {
            tracing::warn!(%err, "audio unavailable, keeping time on the wall clock");
            let clock: Box<dyn TimingSource> = Box::new(WallClock::new());
            (clock, None)
        }
    };
    if log_beats {
        sinks.push(BeatLog);
    }

    let scheduler_config = config.scheduler_config(clock.precision());
    let scheduler = BeatScheduler::with_config(clock, scheduler_config);
    let tick_period = config.tick_period(scheduler.policy());

    (MetronomeHandle::spawn(scheduler, sinks, tick_period), engine)
}

/// Silence and close the output once the transport has stopped sending beats
fn stop_audio(engine: Option<AudioEngine>) {
    if let Some(mut engine) = engine {
        engine.stop();
    }
}

async fn run_tui(config: MetronomeConfig) -> Result<()> {
    let (handle, engine) = start(&config, false);

    let handle = tokio::task::spawn_blocking(move || -> Result<MetronomeHandle> {
        let mut app = App::new(KeyboardController::with_defaults())
            .context("Failed to set up the terminal")?;
        app.run(&handle)?;
        Ok(handle)
    })
    .await??;

    handle.shutdown().await?;
    stop_audio(engine);
    Ok(())
}

async fn run_headless(config: MetronomeConfig, seconds: f64) -> Result<()> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--seconds must be a positive number");
    }

    let (handle, engine) = start(&config, true);
    let mut status = handle.subscribe();
    handle.play()?;

    let deadline = tokio::time::sleep(Duration::from_secs_f64(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let anomaly = status.borrow_and_update().anomaly.clone();
                if let Some(anomaly) = anomaly {
                    tracing::error!(%anomaly, "metronome stopped");
                    break;
                }
            }
        }
    }

    let beats = handle.status().beats;
    handle.shutdown().await?;
    stop_audio(engine);
    tracing::info!(beats, "done");
    Ok(())
}

fn list_devices() {
    let devices = output_devices();
    if devices.is_empty() {
        println!("No audio output devices found");
        return;
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{} {}", marker, device.name);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Tui);
    init_logging(matches!(command, Command::Tui));

    match command {
        Command::Tui => run_tui(load_config(&cli)?).await,
        Command::Headless { seconds } => run_headless(load_config(&cli)?, seconds).await,
        Command::Devices => {
            list_devices();
            Ok(())
        }
        Command::CheckConfig { path } => {
            let config = MetronomeConfig::load(&path)?;
            println!(
                "{}: ok ({}..={} BPM, policy {:?})",
                path.display(),
                config.tempo.min_bpm,
                config.tempo.max_bpm,
                config.scheduling.policy
            );
            Ok(())
        }
        Command::PrintConfig { toml } => {
            let config = load_config(&cli)?;
            let text = if toml { config.to_toml()? } else { config.to_yaml()? };
            print!("{}", text);
            Ok(())
        }
    }
}
