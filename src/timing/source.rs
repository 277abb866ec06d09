// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing sources.
//!
//! A timing source answers "what time is it" in its own fixed time base,
//! expressed as a [`Duration`] since the source's origin. Readings must never
//! go backwards; the drift guard exists for sources that do anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// How precisely a source can place future events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPrecision {
    /// Events can be scheduled for an exact future timestamp
    /// (the audio backend renders them at that sample).
    SampleAccurate,
    /// Events only fire when the caller gets around to them.
    BestEffort,
}

impl ClockPrecision {
    /// Whether emissions can be pre-scheduled ahead of their due time
    pub fn supports_scheduled_emission(&self) -> bool {
        matches!(self, ClockPrecision::SampleAccurate)
    }
}

/// A monotonic clock the scheduler reads on every tick.
pub trait TimingSource: Send + Sync {
    /// Current time since this source's origin
    fn now(&self) -> Duration;

    /// Precision hint used to pick a scheduling policy
    fn precision(&self) -> ClockPrecision;
}

impl<T: TimingSource + ?Sized> TimingSource for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn precision(&self) -> ClockPrecision {
        (**self).precision()
    }
}

impl<T: TimingSource + ?Sized> TimingSource for Box<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn precision(&self) -> ClockPrecision {
        (**self).precision()
    }
}

/// Millisecond-ish wall clock.
///
/// Backed by the tokio clock so paused-time tests can drive it.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    /// Create a wall clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingSource for WallClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn precision(&self) -> ClockPrecision {
        ClockPrecision::BestEffort
    }
}

/// Clock derived from the number of frames the audio callback has rendered.
///
/// Cloning shares the same frame counter.
#[derive(Debug, Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    /// Create an audio clock reading the given frame counter
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Sample rate of the underlying stream
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Convert a timestamp in this clock's time base into a frame index
    pub fn frame_at(&self, at: Duration) -> u64 {
        (at.as_nanos() * self.sample_rate as u128 / 1_000_000_000) as u64
    }
}

impl TimingSource for AudioClock {
    fn now(&self) -> Duration {
        let nanos = self.frames() as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    fn precision(&self) -> ClockPrecision {
        ClockPrecision::SampleAccurate
    }
}

/// Hand-driven clock for simulations and tests.
///
/// Clones share the same reading, so a test can keep one clone and advance
/// it while the scheduler owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
    precision: ClockPrecision,
}

impl ManualClock {
    /// Manual clock that reports best-effort precision
    pub fn best_effort() -> Self {
        Self::with_precision(ClockPrecision::BestEffort)
    }

    /// Manual clock that reports sample-accurate precision
    pub fn sample_accurate() -> Self {
        Self::with_precision(ClockPrecision::SampleAccurate)
    }

    /// Manual clock starting at zero with the given precision
    pub fn with_precision(precision: ClockPrecision) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
            precision,
        }
    }

    /// Set the reading. Nothing stops this from going backwards.
    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::Release);
    }

    /// Move the reading forward
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Set the reading in whole milliseconds
    pub fn set_millis(&self, ms: u64) {
        self.set(Duration::from_millis(ms));
    }
}

impl TimingSource for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn precision(&self) -> ClockPrecision {
        self.precision
    }
}
