// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio engine for the metronome.
//!
//! This module provides:
//! - Click synthesis with round-robin voices
//! - Audio output via cpal
//! - The audio clock derived from rendered frames

pub mod click;
pub mod output;

pub use click::{render_click, ClickSettings, ClickSynth};
pub use output::{output_devices, AudioConfig, AudioOutput, DeviceInfo};

use std::sync::{Arc, Mutex};

use crate::scheduler::{Beat, BeatSink, BeatTiming};
use crate::timing::AudioClock;

/// Audio engine combining click synth and output
pub struct AudioEngine {
    /// Click synth shared with the audio callback
    synth: Arc<Mutex<ClickSynth>>,
    /// Audio output
    output: Option<AudioOutput>,
    /// Clock over the synth's frame counter
    clock: AudioClock,
    /// Output configuration
    config: AudioConfig,
}

impl AudioEngine {
    /// Create a stopped engine
    pub fn new(config: AudioConfig, click: &ClickSettings, tracks: usize) -> Self {
        let synth = ClickSynth::new(config.sample_rate, click, tracks);
        let clock = synth.clock();
        Self {
            synth: Arc::new(Mutex::new(synth)),
            output: None,
            clock,
            config,
        }
    }

    /// Start audio output
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.output.is_some() {
            return Ok(());
        }
        if self.config.channels == 0 {
            return Err(AudioError::InvalidConfig("channel count must be positive".into()));
        }

        let synth = Arc::clone(&self.synth);
        let output = AudioOutput::new(self.config.clone(), move |buffer, channels| {
            if let Ok(mut synth) = synth.lock() {
                synth.render(buffer, channels);
            }
        })?;

        self.output = Some(output);
        Ok(())
    }

    /// Stop audio output. The clock freezes at its last reading.
    pub fn stop(&mut self) {
        if self.output.take().is_some() {
            tracing::info!("audio output stopped");
        }
        if let Ok(mut synth) = self.synth.lock() {
            synth.clear();
        }
    }

    /// Sample-accurate clock for the lookahead scheduler
    pub fn clock(&self) -> AudioClock {
        self.clock.clone()
    }

    /// Beat sink that plays clicks through this engine
    pub fn sink(&self) -> AudioClickSink {
        AudioClickSink {
            synth: Arc::clone(&self.synth),
        }
    }

}

/// Beat sink that schedules clicks on the audio thread
#[derive(Clone)]
pub struct AudioClickSink {
    synth: Arc<Mutex<ClickSynth>>,
}

impl BeatSink for AudioClickSink {
    fn emit(&mut self, beat: Beat) {
        let Ok(mut synth) = self.synth.lock() else {
            tracing::warn!(sequence = beat.sequence, "click synth lock poisoned, beat dropped");
            return;
        };
        match beat.timing {
            BeatTiming::Scheduled => synth.schedule_at(beat.track, beat.due),
            BeatTiming::Immediate => synth.trigger_now(beat.track),
        }
    }
}

/// Audio error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Failed to start audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// Invalid configuration
    #[error("Invalid audio configuration: {0}")]
    InvalidConfig(String),
}
