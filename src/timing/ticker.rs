// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Background tick generator.
//!
//! The ticker runs as its own tokio task and only knows how to repeat a
//! `tick` notification at a polling period. It is driven by an ordered,
//! fire-and-forget command channel; nothing is acknowledged.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Default polling period, in milliseconds
pub const DEFAULT_TICK_MS: f64 = 25.0;

/// Shortest period an `Interval` command may set
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Command sent to the ticker task.
///
/// Serialises as `{"message": "start"}`, `{"message": "interval", "interval": 25.0}`
/// and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "lowercase")]
pub enum TickerCommand {
    /// Begin ticking at the current period
    Start,
    /// Stop ticking; the period is kept
    Stop,
    /// Change the period (milliseconds), restarting a running timer
    Interval { interval: f64 },
    /// Stop and end the task
    Close,
}

impl TickerCommand {
    /// Parse a command from its JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize a command to its JSON form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Notification sent back by the ticker. Serialises as `"tick"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerEvent {
    Tick,
}

/// Handle to a running ticker task
#[derive(Debug)]
pub struct Ticker {
    commands: UnboundedSender<TickerCommand>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a stopped ticker with the given period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(period: Duration) -> (Self, UnboundedReceiver<TickerEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let period = if period.is_zero() {
            Duration::from_secs_f64(DEFAULT_TICK_MS / 1000.0)
        } else {
            period
        };

        let task = tokio::spawn(run_ticker(command_rx, event_tx, period));

        (
            Self {
                commands: command_tx,
                task: Some(task),
            },
            event_rx,
        )
    }

    /// Queue a command. Returns false if the task has already ended.
    pub fn send(&self, command: TickerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Start ticking
    pub fn start(&self) -> bool {
        self.send(TickerCommand::Start)
    }

    /// Stop ticking
    pub fn stop(&self) -> bool {
        self.send(TickerCommand::Stop)
    }

    /// Change the polling period
    pub fn set_interval(&self, period: Duration) -> bool {
        self.send(TickerCommand::Interval {
            interval: period.as_secs_f64() * 1000.0,
        })
    }

    /// Ask the task to close and wait for it to finish
    pub async fn close(mut self) {
        self.send(TickerCommand::Close);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(%err, "ticker task did not finish cleanly");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        // The task exits on Close or when this sender disappears.
        let _ = self.commands.send(TickerCommand::Close);
    }
}

/// Convert an `Interval` payload to a period. NaN, negative, overflowing
/// and sub-millisecond values are rejected.
fn period_from_millis(interval: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(interval / 1000.0)
        .ok()
        .filter(|period| *period >= MIN_PERIOD)
}

fn make_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    // Late ticks coalesce into one instead of bursting to catch up
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_ticker(
    mut commands: UnboundedReceiver<TickerCommand>,
    events: UnboundedSender<TickerEvent>,
    mut period: Duration,
) {
    let mut timer: Option<Interval> = None;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(TickerCommand::Start) => {
                    if timer.is_none() {
                        timer = Some(make_interval(period));
                    }
                }
                Some(TickerCommand::Stop) => {
                    timer = None;
                }
                Some(TickerCommand::Interval { interval }) => {
                    let Some(next) = period_from_millis(interval) else {
                        tracing::warn!(interval, "ignoring invalid ticker interval");
                        continue;
                    };
                    period = next;
                    if timer.is_some() {
                        timer = Some(make_interval(period));
                    }
                }
                Some(TickerCommand::Close) | None => break,
            },

            _ = next_tick(&mut timer) => {
                if events.send(TickerEvent::Tick).is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("ticker closed");
}
