// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the metronome.
//!
//! Settings load from YAML or TOML, chosen by file extension. Every field
//! has a default, so an empty file is a valid configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::{AudioConfig, ClickSettings};
use crate::scheduler::{BpmRange, SchedulerConfig, SchedulingPolicy};
use crate::timing::ClockPrecision;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetronomeConfig {
    /// Tempo bounds and starting tempo
    #[serde(default)]
    pub tempo: TempoConfig,
    /// Scheduling policy and tick periods
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    /// Click sound
    #[serde(default)]
    pub click: ClickSettings,
    /// Audio output
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Serialization format of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a path's extension. Anything but `.toml` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

impl MetronomeConfig {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => Self::from_yaml(&contents)?,
            ConfigFormat::Toml => Self::from_toml(&contents)?,
        };
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Save configuration in the format matching the path's extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => self.to_yaml()?,
            ConfigFormat::Toml => self.to_toml()?,
        };
        fs::write(path, text).with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Parse a configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null, not as an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse a configuration from TOML string
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let tempo = &self.tempo;
        if tempo.min_bpm == 0 {
            bail!("tempo.min_bpm must be at least 1");
        }
        if tempo.min_bpm > tempo.max_bpm {
            bail!(
                "tempo.min_bpm ({}) is greater than tempo.max_bpm ({})",
                tempo.min_bpm,
                tempo.max_bpm
            );
        }
        if !(tempo.min_bpm..=tempo.max_bpm).contains(&tempo.start_bpm) {
            bail!(
                "tempo.start_bpm ({}) is outside {}..={}",
                tempo.start_bpm,
                tempo.min_bpm,
                tempo.max_bpm
            );
        }

        let scheduling = &self.scheduling;
        if scheduling.lookahead_ms == 0 {
            bail!("scheduling.lookahead_ms must be positive");
        }
        if scheduling.poll_interval_ms == 0 || scheduling.wall_clock_poll_ms == 0 {
            bail!("scheduling poll periods must be positive");
        }
        if scheduling.tracks == 0 {
            bail!("scheduling.tracks must be at least 1");
        }

        let click = &self.click;
        if !(0.0..=1.0).contains(&click.volume) {
            bail!("click.volume ({}) must be within 0.0..=1.0", click.volume);
        }
        if click.frequency_hz.is_nan() || click.frequency_hz <= 0.0 {
            bail!("click.frequency_hz must be positive");
        }
        if click.length_ms == 0 {
            bail!("click.length_ms must be positive");
        }

        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            bail!("audio.sample_rate and audio.channels must be positive");
        }
        Ok(())
    }

    /// Scheduler settings for a timing source of the given precision
    pub fn scheduler_config(&self, precision: ClockPrecision) -> SchedulerConfig {
        let lookahead = self.scheduling.lookahead();
        SchedulerConfig {
            range: self.tempo.range(),
            start_bpm: self.tempo.start_bpm,
            policy: Some(self.scheduling.policy.resolve(precision, lookahead)),
            lookahead,
            tracks: self.scheduling.tracks,
        }
    }

    /// Ticker period that drives a policy
    pub fn tick_period(&self, policy: SchedulingPolicy) -> Duration {
        match policy {
            SchedulingPolicy::Lookahead { .. } => {
                Duration::from_millis(self.scheduling.poll_interval_ms)
            }
            SchedulingPolicy::WallClock => Duration::from_millis(self.scheduling.wall_clock_poll_ms),
        }
    }
}

/// Tempo bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Slowest accepted tempo
    #[serde(default = "default_min_bpm")]
    pub min_bpm: u32,
    /// Fastest accepted tempo
    #[serde(default = "default_max_bpm")]
    pub max_bpm: u32,
    /// Tempo at startup
    #[serde(default = "default_start_bpm")]
    pub start_bpm: u32,
}

fn default_min_bpm() -> u32 {
    40
}
fn default_max_bpm() -> u32 {
    200
}
fn default_start_bpm() -> u32 {
    100
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: default_min_bpm(),
            max_bpm: default_max_bpm(),
            start_bpm: default_start_bpm(),
        }
    }
}

impl TempoConfig {
    pub fn range(&self) -> BpmRange {
        BpmRange::new(self.min_bpm, self.max_bpm)
    }
}

/// Requested scheduling policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyChoice {
    /// Lookahead on a sample-accurate clock, wall-clock otherwise
    #[default]
    Auto,
    Lookahead,
    WallClock,
}

impl PolicyChoice {
    /// Turn the choice into a concrete policy.
    ///
    /// Lookahead needs a clock that can place beats in the future; on a
    /// best-effort clock it falls back to wall-clock polling.
    pub fn resolve(self, precision: ClockPrecision, window: Duration) -> SchedulingPolicy {
        match self {
            PolicyChoice::Auto => SchedulingPolicy::for_precision(precision, window),
            PolicyChoice::Lookahead if !precision.supports_scheduled_emission() => {
                tracing::warn!(
                    ?precision,
                    "lookahead needs a sample-accurate clock, using wall-clock polling"
                );
                SchedulingPolicy::WallClock
            }
            PolicyChoice::Lookahead => SchedulingPolicy::Lookahead { window },
            PolicyChoice::WallClock => SchedulingPolicy::WallClock,
        }
    }
}

impl std::str::FromStr for PolicyChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(PolicyChoice::Auto),
            "lookahead" => Ok(PolicyChoice::Lookahead),
            "wall_clock" | "wallclock" => Ok(PolicyChoice::WallClock),
            other => bail!("unknown scheduling policy: {other}"),
        }
    }
}

/// Scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub policy: PolicyChoice,
    /// How far ahead the lookahead policy schedules beats
    #[serde(default = "default_lookahead_ms")]
    pub lookahead_ms: u64,
    /// Tick period under the lookahead policy
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Tick period under the wall-clock policy
    #[serde(default = "default_wall_clock_poll_ms")]
    pub wall_clock_poll_ms: u64,
    /// Round-robin voice count
    #[serde(default = "default_tracks")]
    pub tracks: usize,
}

fn default_lookahead_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    25
}
fn default_wall_clock_poll_ms() -> u64 {
    1
}
fn default_tracks() -> usize {
    4
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            policy: PolicyChoice::Auto,
            lookahead_ms: default_lookahead_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            wall_clock_poll_ms: default_wall_clock_poll_ms(),
            tracks: default_tracks(),
        }
    }
}

impl SchedulingConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }
}
