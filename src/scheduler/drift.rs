// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Drift guard for the wall-clock scheduling policy.

use std::time::Duration;

use crate::error::SchedulingAnomaly;

/// Detects clock faults and tempo overruns.
///
/// The guard itself holds no scheduling state; it only keeps a few
/// counters for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DriftGuard {
    /// Largest observed gap between a beat's due time and its emission
    max_lateness: Duration,
    /// Anomalies reported since creation
    anomalies: u64,
}

impl DriftGuard {
    /// Create a fresh guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the clock reading of a tick against the previous one.
    ///
    /// Going backwards is always a fault. Standing still is only a fault
    /// when a beat is due, since two quick ticks may legitimately share a
    /// reading on a coarse clock.
    pub fn check_clock(
        &mut self,
        now: Duration,
        previous: Option<Duration>,
        beat_due: bool,
    ) -> Result<(), SchedulingAnomaly> {
        let Some(previous) = previous else {
            return Ok(());
        };
        if now < previous || (beat_due && now == previous) {
            self.anomalies += 1;
            return Err(SchedulingAnomaly::NonMonotonicClock { now, previous });
        }
        Ok(())
    }

    /// Check that the freshly advanced deadline is still in the future.
    pub fn check_overrun(
        &mut self,
        now: Duration,
        next_deadline: Duration,
    ) -> Result<(), SchedulingAnomaly> {
        if now >= next_deadline {
            self.anomalies += 1;
            return Err(SchedulingAnomaly::Overrun {
                now,
                deadline: next_deadline,
            });
        }
        Ok(())
    }

    /// Record how late a beat was emitted relative to its due time
    pub fn record_lateness(&mut self, due: Duration, now: Duration) {
        let late = now.saturating_sub(due);
        if late > self.max_lateness {
            self.max_lateness = late;
        }
    }

    /// Largest lateness seen so far
    pub fn max_lateness(&self) -> Duration {
        self.max_lateness
    }

    /// Number of anomalies reported
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }
}
