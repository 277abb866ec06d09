// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Beat scheduler.
//!
//! Turns a tempo and a play/pause command stream into evenly spaced beat
//! emissions. Deadlines advance by exact multiples of the beat interval from
//! the moment playback started, so the coarse and jittery granularity of the
//! polling tick never accumulates into drift.
//!
//! Two policies share the same state:
//! - lookahead: against a sample-accurate clock, every beat due before
//!   `now + window` is handed to the sink with its exact timestamp
//! - wall-clock: against a best-effort clock, at most one beat per tick is
//!   fired immediately once its deadline has passed, guarded by
//!   [`DriftGuard`]

pub mod drift;

pub use drift::DriftGuard;

use std::time::Duration;

use crate::error::{OutOfRangeBpm, SchedulingAnomaly};
use crate::timing::{ClockPrecision, TimingSource};

/// Default lookahead window
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(100);

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

/// Inclusive tempo bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpmRange {
    pub min: u32,
    pub max: u32,
}

impl BpmRange {
    /// Create a range; the bounds are swapped if given backwards
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    /// Whether a tempo lies inside the bounds
    pub fn contains(&self, bpm: u32) -> bool {
        (self.min..=self.max).contains(&bpm)
    }

    /// Accept an in-range tempo or describe why it was rejected
    pub fn check(&self, bpm: i64) -> Result<u32, OutOfRangeBpm> {
        match u32::try_from(bpm) {
            Ok(value) if self.contains(value) => Ok(value),
            _ => Err(OutOfRangeBpm {
                bpm,
                min: self.min,
                max: self.max,
            }),
        }
    }

    /// Position of a tempo within the range, 0.0 to 1.0
    pub fn ratio(&self, bpm: u32) -> f64 {
        if self.max == self.min {
            return 1.0;
        }
        let clamped = bpm.clamp(self.min, self.max);
        (clamped - self.min) as f64 / (self.max - self.min) as f64
    }
}

impl Default for BpmRange {
    fn default() -> Self {
        Self { min: 40, max: 200 }
    }
}

/// How beats are placed in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Pre-schedule every beat due within `window` of now
    Lookahead { window: Duration },
    /// Fire one due beat per tick, immediately
    WallClock,
}

impl SchedulingPolicy {
    /// Pick the policy a clock of the given precision supports
    pub fn for_precision(precision: ClockPrecision, window: Duration) -> Self {
        if precision.supports_scheduled_emission() {
            SchedulingPolicy::Lookahead { window }
        } else {
            SchedulingPolicy::WallClock
        }
    }
}

/// How the sink should place a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatTiming {
    /// Play exactly at `Beat::due` in the clock's time base
    Scheduled,
    /// Play as soon as possible
    Immediate,
}

/// A single emitted beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    /// Number of beats emitted before this one since playback started
    pub sequence: u64,
    /// Deadline this beat was scheduled for
    pub due: Duration,
    /// Round-robin voice index
    pub track: usize,
    /// Whether `due` is exact or the beat should fire now
    pub timing: BeatTiming,
}

/// Receiver of beat emissions.
///
/// Called from the scheduling loop, so implementations must not block.
pub trait BeatSink: Send {
    fn emit(&mut self, beat: Beat);
}

impl<F> BeatSink for F
where
    F: FnMut(Beat) + Send,
{
    fn emit(&mut self, beat: Beat) {
        self(beat)
    }
}

/// Scheduler construction parameters
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Accepted tempo range
    pub range: BpmRange,
    /// Initial tempo, clamped into `range`
    pub start_bpm: u32,
    /// Placement policy; `None` derives it from the clock precision
    pub policy: Option<SchedulingPolicy>,
    /// Lookahead window used when the policy is derived
    pub lookahead: Duration,
    /// Number of round-robin voices
    pub tracks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            range: BpmRange::default(),
            start_bpm: 100,
            policy: None,
            lookahead: DEFAULT_LOOKAHEAD,
            tracks: 1,
        }
    }
}

/// Beat scheduler bound to a timing source
#[derive(Debug)]
pub struct BeatScheduler<C> {
    clock: C,
    policy: SchedulingPolicy,
    range: BpmRange,
    bpm: u32,
    interval: Duration,
    state: PlayState,
    next_deadline: Option<Duration>,
    previous_tick: Option<Duration>,
    track_index: usize,
    track_count: usize,
    beats_emitted: u64,
    last_beat: Option<Beat>,
    last_anomaly: Option<SchedulingAnomaly>,
    guard: DriftGuard,
}

/// Interval between beats at a tempo, truncated to whole nanoseconds
pub fn beat_interval(bpm: u32) -> Duration {
    Duration::from_nanos(60_000_000_000 / bpm.max(1) as u64)
}

impl<C: TimingSource> BeatScheduler<C> {
    /// Create a stopped scheduler with default configuration
    pub fn new(clock: C) -> Self {
        Self::with_config(clock, SchedulerConfig::default())
    }

    /// Create a stopped scheduler
    pub fn with_config(clock: C, config: SchedulerConfig) -> Self {
        let range = config.range;
        let bpm = config.start_bpm.max(range.min).min(range.max).max(1);
        let policy = config
            .policy
            .unwrap_or_else(|| SchedulingPolicy::for_precision(clock.precision(), config.lookahead));

        Self {
            clock,
            policy,
            range,
            bpm,
            interval: beat_interval(bpm),
            state: PlayState::Stopped,
            next_deadline: None,
            previous_tick: None,
            track_index: 0,
            track_count: config.tracks.max(1),
            beats_emitted: 0,
            last_beat: None,
            last_anomaly: None,
            guard: DriftGuard::new(),
        }
    }

    /// Current tempo
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Accepted tempo range
    pub fn range(&self) -> BpmRange {
        self.range
    }

    /// Interval between beats
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Interval between beats in milliseconds
    pub fn interval_ms(&self) -> f64 {
        self.interval.as_secs_f64() * 1000.0
    }

    /// Current play state
    pub fn play_state(&self) -> PlayState {
        self.state
    }

    /// Check if playing
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Active placement policy
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Deadline of the next beat, if scheduling has begun
    pub fn next_deadline(&self) -> Option<Duration> {
        self.next_deadline
    }

    /// Clock reading of the last tick
    pub fn previous_tick(&self) -> Option<Duration> {
        self.previous_tick
    }

    /// Voice the next beat will use
    pub fn track_index(&self) -> usize {
        self.track_index
    }

    /// Beats emitted since the last `play`
    pub fn beats_emitted(&self) -> u64 {
        self.beats_emitted
    }

    /// Most recent beat
    pub fn last_beat(&self) -> Option<Beat> {
        self.last_beat
    }

    /// Anomaly that stopped the last session, if any
    pub fn last_anomaly(&self) -> Option<&SchedulingAnomaly> {
        self.last_anomaly.as_ref()
    }

    /// Drift guard diagnostics
    pub fn guard(&self) -> &DriftGuard {
        &self.guard
    }

    /// The timing source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Set the tempo.
    ///
    /// Out-of-range values are ignored. A beat that is already scheduled
    /// keeps its deadline; the new interval applies from the following beat.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.apply_bpm(bpm as i64);
    }

    /// Move the tempo up or down by `delta`, subject to the same bounds
    pub fn nudge_bpm(&mut self, delta: i32) {
        self.apply_bpm(self.bpm as i64 + delta as i64);
    }

    fn apply_bpm(&mut self, requested: i64) {
        match self.range.check(requested) {
            Ok(bpm) => {
                if bpm != self.bpm {
                    self.bpm = bpm;
                    self.interval = beat_interval(bpm);
                    tracing::info!(bpm, interval_ms = self.interval_ms(), "tempo changed");
                }
            }
            Err(rejected) => {
                tracing::debug!(%rejected, "tempo change ignored");
            }
        }
    }

    /// Start playback. No effect if already playing.
    ///
    /// The first beat fires on the next tick, not from inside this call.
    pub fn play(&mut self) {
        if self.state == PlayState::Playing {
            return;
        }
        self.state = PlayState::Playing;
        self.reset_schedule();
        self.beats_emitted = 0;
        self.last_beat = None;
        self.last_anomaly = None;
        tracing::info!(bpm = self.bpm, policy = ?self.policy, "playback started");
    }

    /// Stop playback. No effect if already stopped.
    pub fn pause(&mut self) {
        if self.state == PlayState::Stopped {
            return;
        }
        self.state = PlayState::Stopped;
        self.reset_schedule();
        tracing::info!(beats = self.beats_emitted, "playback stopped");
    }

    /// Flip between playing and stopped
    pub fn toggle(&mut self) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(),
        }
    }

    fn reset_schedule(&mut self) {
        self.next_deadline = None;
        self.previous_tick = None;
    }

    /// Run one scheduling tick, emitting every beat that is due.
    ///
    /// Returns the number of beats emitted. A tick that arrives while
    /// stopped does nothing. An anomaly stops playback before it is
    /// returned.
    pub fn on_tick<K>(&mut self, sink: &mut K) -> Result<usize, SchedulingAnomaly>
    where
        K: BeatSink + ?Sized,
    {
        if self.state != PlayState::Playing {
            return Ok(0);
        }

        match self.policy {
            SchedulingPolicy::Lookahead { window } => Ok(self.tick_lookahead(sink, window)),
            SchedulingPolicy::WallClock => self.tick_wall_clock(sink),
        }
    }

    fn tick_lookahead<K>(&mut self, sink: &mut K, window: Duration) -> usize
    where
        K: BeatSink + ?Sized,
    {
        let now = self.clock.now();
        let horizon = now + window;
        let mut deadline = self.next_deadline.unwrap_or(now);
        let mut emitted = 0;

        while deadline < horizon {
            self.emit(sink, deadline, BeatTiming::Scheduled);
            deadline += self.interval;
            emitted += 1;
        }

        self.next_deadline = Some(deadline);
        self.previous_tick = Some(now);
        emitted
    }

    fn tick_wall_clock<K>(&mut self, sink: &mut K) -> Result<usize, SchedulingAnomaly>
    where
        K: BeatSink + ?Sized,
    {
        let now = self.clock.now();
        let deadline = *self.next_deadline.get_or_insert(now);
        let due = now >= deadline;

        if let Err(anomaly) = self.guard.check_clock(now, self.previous_tick, due) {
            return Err(self.fail(anomaly));
        }

        let mut emitted = 0;
        if due {
            self.guard.record_lateness(deadline, now);
            self.emit(sink, deadline, BeatTiming::Immediate);
            let next = deadline + self.interval;
            self.next_deadline = Some(next);
            emitted = 1;

            if let Err(anomaly) = self.guard.check_overrun(now, next) {
                return Err(self.fail(anomaly));
            }
        }

        self.previous_tick = Some(now);
        Ok(emitted)
    }

    fn emit<K>(&mut self, sink: &mut K, due: Duration, timing: BeatTiming)
    where
        K: BeatSink + ?Sized,
    {
        let beat = Beat {
            sequence: self.beats_emitted,
            due,
            track: self.track_index,
            timing,
        };
        sink.emit(beat);
        tracing::trace!(sequence = beat.sequence, due = ?due, track = beat.track, "beat");

        self.track_index = (self.track_index + 1) % self.track_count;
        self.beats_emitted += 1;
        self.last_beat = Some(beat);
    }

    fn fail(&mut self, anomaly: SchedulingAnomaly) -> SchedulingAnomaly {
        tracing::warn!(%anomaly, "stopping after scheduling anomaly");
        self.state = PlayState::Stopped;
        self.reset_schedule();
        self.last_anomaly = Some(anomaly.clone());
        anomaly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::ManualClock;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn wall_clock_scheduler(bpm: u32) -> (BeatScheduler<ManualClock>, ManualClock) {
        let clock = ManualClock::best_effort();
        let scheduler = BeatScheduler::with_config(
            clock.clone(),
            SchedulerConfig {
                start_bpm: bpm,
                ..Default::default()
            },
        );
        (scheduler, clock)
    }

    #[test]
    fn test_scheduler_creation() {
        let (scheduler, _) = wall_clock_scheduler(100);
        assert_eq!(scheduler.bpm(), 100);
        assert_eq!(scheduler.play_state(), PlayState::Stopped);
        assert_eq!(scheduler.policy(), SchedulingPolicy::WallClock);
        assert!(scheduler.next_deadline().is_none());
        assert!((scheduler.interval_ms() - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_policy_follows_clock_precision() {
        let scheduler = BeatScheduler::new(ManualClock::sample_accurate());
        assert_eq!(
            scheduler.policy(),
            SchedulingPolicy::Lookahead {
                window: DEFAULT_LOOKAHEAD
            }
        );
    }

    #[test]
    fn test_start_bpm_clamped_into_range() {
        let scheduler = BeatScheduler::with_config(
            ManualClock::best_effort(),
            SchedulerConfig {
                start_bpm: 500,
                ..Default::default()
            },
        );
        assert_eq!(scheduler.bpm(), 200);
    }

    #[test]
    fn test_set_bpm_in_range() {
        let (mut scheduler, _) = wall_clock_scheduler(100);
        for bpm in [40, 61, 120, 173, 200] {
            scheduler.set_bpm(bpm);
            assert_eq!(scheduler.bpm(), bpm);
            assert!((scheduler.interval_ms() - 60_000.0 / bpm as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_bpm_out_of_range_is_ignored() {
        let (mut scheduler, _) = wall_clock_scheduler(100);
        let interval = scheduler.interval();

        scheduler.set_bpm(39);
        scheduler.set_bpm(201);
        scheduler.set_bpm(0);

        assert_eq!(scheduler.bpm(), 100);
        assert_eq!(scheduler.interval(), interval);
    }

    #[test]
    fn test_nudge_bpm_stops_at_bounds() {
        let (mut scheduler, _) = wall_clock_scheduler(41);
        scheduler.nudge_bpm(-1);
        assert_eq!(scheduler.bpm(), 40);
        scheduler.nudge_bpm(-1);
        assert_eq!(scheduler.bpm(), 40);

        scheduler.set_bpm(199);
        scheduler.nudge_bpm(1);
        assert_eq!(scheduler.bpm(), 200);
        scheduler.nudge_bpm(1);
        assert_eq!(scheduler.bpm(), 200);
    }

    #[test]
    fn test_play_pause_idempotent() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut beats = Vec::new();

        scheduler.pause();
        assert_eq!(scheduler.play_state(), PlayState::Stopped);

        scheduler.play();
        scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap();
        let deadline = scheduler.next_deadline();

        clock.set_millis(100);
        scheduler.play();
        assert_eq!(scheduler.play_state(), PlayState::Playing);
        assert_eq!(scheduler.next_deadline(), deadline);
        assert_eq!(beats.len(), 1);
    }

    #[test]
    fn test_tick_while_stopped_does_nothing() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut count = 0;
        clock.set_millis(1000);
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1).unwrap(), 0);
        assert_eq!(count, 0);
        assert!(scheduler.previous_tick().is_none());
    }

    #[test]
    fn test_wall_clock_first_beat_on_first_tick() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut beats = Vec::new();
        clock.set_millis(250);

        scheduler.play();
        assert!(beats.is_empty());

        scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].due, ms(250));
        assert_eq!(beats[0].timing, BeatTiming::Immediate);
        assert_eq!(scheduler.next_deadline(), Some(ms(750)));
    }

    #[test]
    fn test_wall_clock_deadline_advances_by_interval_not_now() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut beats = Vec::new();

        scheduler.play();
        scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap();

        // Tick lands 7ms late; the following deadline still sits on the grid
        clock.set_millis(507);
        scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap();
        assert_eq!(beats[1].due, ms(500));
        assert_eq!(scheduler.next_deadline(), Some(ms(1000)));
        assert_eq!(scheduler.guard().max_lateness(), ms(7));
    }

    #[test]
    fn test_round_robin_tracks() {
        let clock = ManualClock::best_effort();
        let mut scheduler = BeatScheduler::with_config(
            clock.clone(),
            SchedulerConfig {
                start_bpm: 120,
                tracks: 3,
                ..Default::default()
            },
        );
        let mut tracks = Vec::new();
        scheduler.play();
        for t in 0..5u64 {
            clock.set_millis(t * 500);
            scheduler.on_tick(&mut |b: Beat| tracks.push(b.track)).unwrap();
        }
        assert_eq!(tracks, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_backwards_clock_stops_before_next_beat() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut count = 0;

        scheduler.play();
        clock.set_millis(10);
        scheduler.on_tick(&mut |_: Beat| count += 1).unwrap();
        clock.set_millis(20);
        scheduler.on_tick(&mut |_: Beat| count += 1).unwrap();

        clock.set_millis(5);
        let err = scheduler.on_tick(&mut |_: Beat| count += 1).unwrap_err();
        assert!(matches!(err, SchedulingAnomaly::NonMonotonicClock { .. }));
        assert_eq!(count, 1);
        assert_eq!(scheduler.play_state(), PlayState::Stopped);
        assert!(scheduler.next_deadline().is_none());
        assert_eq!(scheduler.last_anomaly(), Some(&err));

        // Later ticks stay silent
        clock.set_millis(2000);
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1).unwrap(), 0);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_overrun_detected_after_stall() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut count = 0;

        scheduler.play();
        scheduler.on_tick(&mut |_: Beat| count += 1).unwrap();

        // Loop stalled for more than two intervals
        clock.set_millis(1100);
        let err = scheduler.on_tick(&mut |_: Beat| count += 1).unwrap_err();
        assert_eq!(
            err,
            SchedulingAnomaly::Overrun {
                now: ms(1100),
                deadline: ms(1000)
            }
        );
        assert_eq!(count, 2);
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_play_clears_previous_anomaly() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        scheduler.play();
        scheduler.on_tick(&mut |_: Beat| {}).unwrap();
        clock.set_millis(5000);
        assert!(scheduler.on_tick(&mut |_: Beat| {}).is_err());
        assert!(scheduler.last_anomaly().is_some());

        scheduler.play();
        assert!(scheduler.last_anomaly().is_none());
        assert_eq!(scheduler.on_tick(&mut |_: Beat| {}).unwrap(), 1);
    }

    #[test]
    fn test_lookahead_drains_late_ticks() {
        let clock = ManualClock::sample_accurate();
        let mut scheduler = BeatScheduler::with_config(
            clock.clone(),
            SchedulerConfig {
                start_bpm: 120,
                ..Default::default()
            },
        );
        let mut beats = Vec::new();

        scheduler.play();
        assert_eq!(scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap(), 1);

        // One very late tick catches up on every beat before the horizon
        clock.set_millis(1450);
        assert_eq!(scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap(), 3);

        let due: Vec<_> = beats.iter().map(|b| b.due).collect();
        assert_eq!(due, vec![ms(0), ms(500), ms(1000), ms(1500)]);
        assert!(beats.iter().all(|b| b.timing == BeatTiming::Scheduled));
        assert_eq!(scheduler.next_deadline(), Some(ms(2000)));
    }

    #[test]
    fn test_tick_queued_before_pause_emits_nothing() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        let mut count = 0;

        scheduler.play();
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1), Ok(1));
        scheduler.pause();

        // Well past the next deadline: a stale tick still must not fire
        clock.set_millis(2000);
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1), Ok(0));
        assert_eq!(count, 1);
        assert!(scheduler.next_deadline().is_none());
        assert_eq!(scheduler.play_state(), PlayState::Stopped);

        let clock = ManualClock::sample_accurate();
        let mut scheduler = BeatScheduler::new(clock.clone());
        let mut count = 0;
        scheduler.play();
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1), Ok(1));
        scheduler.pause();
        clock.set_millis(2000);
        assert_eq!(scheduler.on_tick(&mut |_: Beat| count += 1), Ok(0));
        assert_eq!(count, 1);
    }

    #[test]
    fn test_pause_resets_schedule() {
        let (mut scheduler, clock) = wall_clock_scheduler(120);
        scheduler.play();
        scheduler.on_tick(&mut |_: Beat| {}).unwrap();
        assert!(scheduler.next_deadline().is_some());

        scheduler.pause();
        assert!(scheduler.next_deadline().is_none());
        assert!(scheduler.previous_tick().is_none());

        // Resuming starts a fresh grid at the new now
        clock.set_millis(1234);
        scheduler.play();
        let mut beats = Vec::new();
        scheduler.on_tick(&mut |b: Beat| beats.push(b)).unwrap();
        assert_eq!(beats[0].due, ms(1234));
        assert_eq!(beats[0].sequence, 0);
    }

    #[test]
    fn test_bpm_range_helpers() {
        let range = BpmRange::new(200, 40);
        assert_eq!(range, BpmRange { min: 40, max: 200 });
        assert!(range.check(-5).is_err());
        assert_eq!(range.check(40), Ok(40));
        assert_eq!(range.ratio(40), 0.0);
        assert_eq!(range.ratio(200), 1.0);
        assert!((range.ratio(120) - 0.5).abs() < 1e-9);
    }
}
