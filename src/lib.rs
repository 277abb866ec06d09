// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Metronome beat scheduler.
//!
//! The [`scheduler`] turns a tempo and play/pause commands into evenly
//! spaced beats against a [`timing`] source. The [`transport`] runs it on a
//! tokio task driven by a background ticker; [`audio`] turns beats into
//! clicks and [`ui`] draws the terminal front end.

pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod scheduler;
pub mod timing;
pub mod transport;
pub mod ui;

pub use config::MetronomeConfig;
pub use error::{MetronomeError, OutOfRangeBpm, Result, SchedulingAnomaly};
pub use scheduler::{
    Beat, BeatScheduler, BeatSink, BeatTiming, BpmRange, PlayState, SchedulerConfig,
    SchedulingPolicy,
};
pub use timing::{AudioClock, ClockPrecision, ManualClock, TimingSource, WallClock};
pub use transport::{BeatFanout, BeatLog, MetronomeHandle, TransportCommand, TransportStatus};
