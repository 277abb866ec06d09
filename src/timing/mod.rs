// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing sources and the background ticker.
//!
//! This module provides the clocks the beat scheduler reads and the
//! tokio task that wakes it up at a polling period.

pub mod source;
pub mod ticker;

pub use source::{AudioClock, ClockPrecision, ManualClock, TimingSource, WallClock};
pub use ticker::{Ticker, TickerCommand, TickerEvent};
