// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Click synthesis.
//!
//! A single click waveform is rendered once up front. Each round-robin
//! track owns one voice slot that replays the waveform from a given frame,
//! so a new beat never cuts off a click that is still ringing on another
//! track.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::timing::AudioClock;

/// Fade applied to both ends of the click to avoid pops
const FADE_MS: f32 = 2.0;

/// Sound of a single click
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickSettings {
    /// Oscillator frequency in Hz
    #[serde(default = "default_frequency")]
    pub frequency_hz: f32,
    /// Output gain (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Click length in milliseconds
    #[serde(default = "default_length_ms")]
    pub length_ms: u32,
}

fn default_frequency() -> f32 {
    440.0
}
fn default_volume() -> f32 {
    0.1
}
fn default_length_ms() -> u32 {
    75
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency(),
            volume: default_volume(),
            length_ms: default_length_ms(),
        }
    }
}

/// Render the click waveform at a sample rate
pub fn render_click(settings: &ClickSettings, sample_rate: u32) -> Vec<f32> {
    let sample_rate = sample_rate.max(1) as f32;
    let len = (sample_rate * settings.length_ms as f32 / 1000.0) as usize;
    let fade = ((sample_rate * FADE_MS / 1000.0) as usize).clamp(1, len.max(1));
    let step = TAU * settings.frequency_hz / sample_rate;

    (0..len)
        .map(|i| {
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if len - i <= fade {
                (len - i) as f32 / fade as f32
            } else {
                1.0
            };
            (i as f32 * step).sin() * settings.volume * envelope
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    start_frame: u64,
}

/// Mixer of scheduled clicks, advanced by the audio callback
#[derive(Debug)]
pub struct ClickSynth {
    sample_rate: u32,
    waveform: Vec<f32>,
    voices: Vec<Option<Voice>>,
    frames: Arc<AtomicU64>,
}

impl ClickSynth {
    /// Create a synth with one voice per track
    pub fn new(sample_rate: u32, settings: &ClickSettings, tracks: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            waveform: render_click(settings, sample_rate),
            voices: vec![None; tracks.max(1)],
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Clock that advances as this synth renders
    pub fn clock(&self) -> AudioClock {
        AudioClock::new(Arc::clone(&self.frames), self.sample_rate)
    }

    /// Frames rendered so far
    pub fn frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Start a click on `track` at an absolute frame
    pub fn schedule(&mut self, track: usize, start_frame: u64) {
        let slot = track % self.voices.len();
        self.voices[slot] = Some(Voice { start_frame });
    }

    /// Start a click at a timestamp in the audio clock's time base
    pub fn schedule_at(&mut self, track: usize, at: Duration) {
        let frame = self.clock().frame_at(at);
        self.schedule(track, frame);
    }

    /// Start a click at the next rendered frame
    pub fn trigger_now(&mut self, track: usize) {
        let frame = self.frame();
        self.schedule(track, frame);
    }

    /// Silence every voice
    pub fn clear(&mut self) {
        self.voices.iter_mut().for_each(|v| *v = None);
    }

    /// Number of voices that still have samples to play
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    /// Mix active voices into an interleaved buffer and advance the clock
    pub fn render(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = (buffer.len() / channels) as u64;
        let first = self.frame();
        let click_len = self.waveform.len() as u64;

        for slot in self.voices.iter_mut() {
            let Some(voice) = *slot else { continue };
            let end = voice.start_frame + click_len;

            if end <= first {
                *slot = None;
                continue;
            }

            let from = voice.start_frame.max(first);
            let to = end.min(first + frames);
            for frame in from..to {
                let sample = self.waveform[(frame - voice.start_frame) as usize];
                let offset = (frame - first) as usize * channels;
                for out in &mut buffer[offset..offset + channels] {
                    *out += sample;
                }
            }

            if end <= first + frames {
                *slot = None;
            }
        }

        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}
