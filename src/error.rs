// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types shared across the metronome.

use std::time::Duration;

use crate::audio::AudioError;

/// Result alias carrying [`MetronomeError`].
pub type Result<T> = std::result::Result<T, MetronomeError>;

/// A timing fault detected while the wall-clock scheduler was running.
///
/// Either variant stops the scheduler. They are never retried: scheduling
/// against a corrupted deadline could fire a burst of beats.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingAnomaly {
    /// The next beat was already due right after advancing the deadline,
    /// so the tick loop cannot keep up with the requested tempo.
    #[error("scheduler overrun: beat due at {deadline:?} had already passed at {now:?}")]
    Overrun {
        /// Clock reading when the overrun was detected
        now: Duration,
        /// The freshly advanced deadline that was already behind
        deadline: Duration,
    },
    /// The clock went backwards or stood still between ticks.
    #[error("clock is not monotonic: read {now:?} after previous tick at {previous:?}")]
    NonMonotonicClock {
        /// Clock reading of the current tick
        now: Duration,
        /// Clock reading of the previous tick
        previous: Duration,
    },
}

impl SchedulingAnomaly {
    /// Short label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            SchedulingAnomaly::Overrun { .. } => "overrun",
            SchedulingAnomaly::NonMonotonicClock { .. } => "non-monotonic clock",
        }
    }
}

/// A tempo request outside the configured bounds.
///
/// Rejected requests leave the tempo untouched; this is only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{bpm} BPM is outside the accepted range {min}..={max}")]
pub struct OutOfRangeBpm {
    pub bpm: i64,
    pub min: u32,
    pub max: u32,
}

/// Top-level error for the metronome library.
#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    /// Audio output could not be set up
    #[error(transparent)]
    Audio(#[from] AudioError),
    /// The transport task is gone
    #[error("transport task has shut down")]
    TransportClosed,
    /// The runtime loop panicked or was cancelled
    #[error("transport task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Wrapper around standard IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
