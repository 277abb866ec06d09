// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport: the runtime loop that owns the scheduler.
//!
//! A single tokio task holds the [`BeatScheduler`], the beat sink and a
//! [`Ticker`]. Control commands and ticks are interleaved on that task, so
//! the scheduler never needs a lock. Commands always win over pending
//! ticks; a tick that was already queued when playback stopped is absorbed
//! by the scheduler's own state check.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{MetronomeError, Result, SchedulingAnomaly};
use crate::scheduler::{Beat, BeatScheduler, BeatSink, BpmRange, PlayState, SchedulingPolicy};
use crate::timing::{Ticker, TickerEvent, TimingSource};

/// Command sent to the transport task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Toggle,
    /// Set an absolute tempo
    SetBpm(u32),
    /// Move the tempo by a relative amount
    Nudge(i32),
    Shutdown,
}

/// Snapshot of the scheduler, published after every change
#[derive(Debug, Clone, PartialEq)]
pub struct TransportStatus {
    pub bpm: u32,
    pub range: BpmRange,
    pub play_state: PlayState,
    pub interval: Duration,
    pub policy: SchedulingPolicy,
    /// Beats emitted since playback last started
    pub beats: u64,
    pub last_beat: Option<Beat>,
    /// Fault that stopped the last session
    pub anomaly: Option<SchedulingAnomaly>,
}

impl TransportStatus {
    fn capture<C: TimingSource>(scheduler: &BeatScheduler<C>) -> Self {
        Self {
            bpm: scheduler.bpm(),
            range: scheduler.range(),
            play_state: scheduler.play_state(),
            interval: scheduler.interval(),
            policy: scheduler.policy(),
            beats: scheduler.beats_emitted(),
            last_beat: scheduler.last_beat(),
            anomaly: scheduler.last_anomaly().cloned(),
        }
    }

    /// Check if playing
    pub fn is_playing(&self) -> bool {
        self.play_state == PlayState::Playing
    }
}

/// Handle to a running metronome
pub struct MetronomeHandle {
    commands: mpsc::UnboundedSender<TransportCommand>,
    status: watch::Receiver<TransportStatus>,
    task: Option<JoinHandle<()>>,
}

impl MetronomeHandle {
    /// Spawn the transport task.
    ///
    /// `tick_period` is the polling period of the ticker. Must be called
    /// from within a tokio runtime.
    pub fn spawn<C, K>(scheduler: BeatScheduler<C>, sink: K, tick_period: Duration) -> Self
    where
        C: TimingSource + 'static,
        K: BeatSink + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(TransportStatus::capture(&scheduler));

        let task = tokio::spawn(run_transport(
            scheduler,
            sink,
            command_rx,
            status_tx,
            tick_period,
        ));

        Self {
            commands: command_tx,
            status: status_rx,
            task: Some(task),
        }
    }

    /// Queue a command for the transport task
    pub fn send(&self, command: TransportCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| MetronomeError::TransportClosed)
    }

    /// Start playback
    pub fn play(&self) -> Result<()> {
        self.send(TransportCommand::Play)
    }

    /// Stop playback
    pub fn pause(&self) -> Result<()> {
        self.send(TransportCommand::Pause)
    }

    /// Flip between playing and stopped
    pub fn toggle(&self) -> Result<()> {
        self.send(TransportCommand::Toggle)
    }

    /// Set the tempo; out-of-range values are ignored
    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        self.send(TransportCommand::SetBpm(bpm))
    }

    /// Move the tempo by `delta`, stopping at the bounds
    pub fn nudge_bpm(&self, delta: i32) -> Result<()> {
        self.send(TransportCommand::Nudge(delta))
    }

    /// Latest published status
    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<TransportStatus> {
        self.status.clone()
    }

    /// Stop playback, close the ticker and wait for the task to end
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.commands.send(TransportCommand::Shutdown);
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}

impl Drop for MetronomeHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(TransportCommand::Shutdown);
        }
    }
}

async fn run_transport<C, K>(
    mut scheduler: BeatScheduler<C>,
    mut sink: K,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    status: watch::Sender<TransportStatus>,
    tick_period: Duration,
) where
    C: TimingSource,
    K: BeatSink,
{
    let (ticker, mut ticks) = Ticker::spawn(tick_period);
    let publish = |scheduler: &BeatScheduler<C>| {
        status.send_replace(TransportStatus::capture(scheduler));
    };

    tracing::debug!(?tick_period, policy = ?scheduler.policy(), "transport started");

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    TransportCommand::Play => scheduler.play(),
                    TransportCommand::Pause => scheduler.pause(),
                    TransportCommand::Toggle => scheduler.toggle(),
                    TransportCommand::SetBpm(bpm) => scheduler.set_bpm(bpm),
                    TransportCommand::Nudge(delta) => scheduler.nudge_bpm(delta),
                    TransportCommand::Shutdown => break,
                }

                // Observers see the new state before the first tick of a session
                publish(&scheduler);
                if scheduler.is_playing() {
                    ticker.start();
                } else {
                    ticker.stop();
                }
            }

            Some(TickerEvent::Tick) = ticks.recv() => {
                match scheduler.on_tick(&mut sink) {
                    Ok(0) => {}
                    Ok(_) => publish(&scheduler),
                    Err(_) => {
                        ticker.stop();
                        publish(&scheduler);
                    }
                }
            }
        }
    }

    scheduler.pause();
    publish(&scheduler);
    ticker.close().await;
    tracing::debug!("transport closed");
}

/// Sends each beat to several sinks in order
#[derive(Default)]
pub struct BeatFanout {
    sinks: Vec<Box<dyn BeatSink>>,
}

impl BeatFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink, builder style
    pub fn with<K: BeatSink + 'static>(mut self, sink: K) -> Self {
        self.push(sink);
        self
    }

    /// Add a sink
    pub fn push<K: BeatSink + 'static>(&mut self, sink: K) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl BeatSink for BeatFanout {
    fn emit(&mut self, beat: Beat) {
        for sink in &mut self.sinks {
            sink.emit(beat);
        }
    }
}

/// Sink that only logs beats
#[derive(Debug, Clone, Copy, Default)]
pub struct BeatLog;

impl BeatSink for BeatLog {
    fn emit(&mut self, beat: Beat) {
        tracing::info!(
            sequence = beat.sequence,
            track = beat.track,
            due_ms = beat.due.as_secs_f64() * 1000.0,
            "beat"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;
    use crate::timing::{ManualClock, WallClock};
    use std::sync::{Arc, Mutex};

    type Recorded = Arc<Mutex<Vec<Beat>>>;

    fn recorder() -> (Recorded, impl BeatSink + 'static) {
        let beats: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink_beats = Arc::clone(&beats);
        (beats, move |beat: Beat| sink_beats.lock().unwrap().push(beat))
    }

    fn config(bpm: u32) -> SchedulerConfig {
        SchedulerConfig {
            start_bpm: bpm,
            policy: Some(SchedulingPolicy::WallClock),
            ..Default::default()
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_beats_follow_tempo() {
        let (beats, sink) = recorder();
        let scheduler = BeatScheduler::with_config(WallClock::new(), config(120));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));

        handle.play().unwrap();
        sleep_ms(1990).await;

        assert_eq!(beats.lock().unwrap().len(), 4);
        let status = handle.status();
        assert!(status.is_playing());
        assert_eq!(status.beats, 4);
        assert_eq!(status.bpm, 120);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_stops_emission() {
        let (beats, sink) = recorder();
        let scheduler = BeatScheduler::with_config(WallClock::new(), config(120));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));

        handle.play().unwrap();
        sleep_ms(600).await;
        handle.pause().unwrap();
        sleep_ms(2000).await;

        assert_eq!(beats.lock().unwrap().len(), 2);
        assert_eq!(handle.status().play_state, PlayState::Stopped);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_published_before_first_beat() {
        let observer: Arc<Mutex<Option<watch::Receiver<TransportStatus>>>> =
            Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink_observer = Arc::clone(&observer);
        let sink_seen = Arc::clone(&seen);
        let sink = move |_: Beat| {
            if let Some(rx) = sink_observer.lock().unwrap().as_ref() {
                sink_seen.lock().unwrap().push(rx.borrow().play_state);
            }
        };

        let scheduler = BeatScheduler::with_config(WallClock::new(), config(100));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));
        *observer.lock().unwrap() = Some(handle.subscribe());

        handle.play().unwrap();
        sleep_ms(10).await;

        assert_eq!(*seen.lock().unwrap(), vec![PlayState::Playing]);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tempo_commands() {
        let (_, sink) = recorder();
        let scheduler = BeatScheduler::with_config(WallClock::new(), config(100));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));

        handle.set_bpm(150).unwrap();
        handle.nudge_bpm(-3).unwrap();
        handle.set_bpm(500).unwrap();
        sleep_ms(1).await;

        let status = handle.status();
        assert_eq!(status.bpm, 147);
        assert_eq!(status.play_state, PlayState::Stopped);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_anomaly_stops_and_is_published() {
        let (beats, sink) = recorder();
        let clock = ManualClock::best_effort();
        let scheduler = BeatScheduler::with_config(clock.clone(), config(120));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));

        handle.play().unwrap();
        sleep_ms(10).await;
        assert_eq!(beats.lock().unwrap().len(), 1);

        clock.set_millis(1100);
        sleep_ms(10).await;

        let status = handle.status();
        assert_eq!(status.play_state, PlayState::Stopped);
        assert!(matches!(status.anomaly, Some(SchedulingAnomaly::Overrun { .. })));
        assert_eq!(beats.lock().unwrap().len(), 2);

        // Restarting clears the fault
        handle.toggle().unwrap();
        sleep_ms(1).await;
        let status = handle.status();
        assert!(status.is_playing());
        assert!(status.anomaly.is_none());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_sink() {
        let (beats, sink) = recorder();
        let scheduler = BeatScheduler::with_config(WallClock::new(), config(120));
        let handle = MetronomeHandle::spawn(scheduler, sink, Duration::from_millis(5));

        handle.play().unwrap();
        sleep_ms(5).await;
        handle.shutdown().await.unwrap();

        assert_eq!(Arc::strong_count(&beats), 1);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let (first, a) = recorder();
        let (second, b) = recorder();
        let mut fanout = BeatFanout::new().with(a).with(b).with(BeatLog);
        assert_eq!(fanout.len(), 3);

        fanout.emit(Beat {
            sequence: 0,
            due: Duration::ZERO,
            track: 0,
            timing: crate::scheduler::BeatTiming::Immediate,
        });
        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }
}
