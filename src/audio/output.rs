// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! The output stream pulls samples from a render callback. Every frame it
//! pulls advances the synth's frame counter, which is what the audio clock
//! reads, so the stream must keep running for the clock to move.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Host, SampleRate, Stream, StreamConfig};
use serde::{Deserialize, Serialize};

use super::AudioError;

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device name; the host default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Buffer size in frames; device default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
    /// Number of output channels
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_sample_rate() -> u32 {
    44100
}
fn default_channels() -> u16 {
    2
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            buffer_size: None,
            channels: default_channels(),
        }
    }
}

impl AudioConfig {
    /// Latency of one buffer in milliseconds, if the size is fixed
    pub fn buffer_latency_ms(&self) -> Option<f64> {
        self.buffer_size
            .map(|frames| frames as f64 / self.sample_rate as f64 * 1000.0)
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: self.buffer_size.map_or(BufferSize::Default, BufferSize::Fixed),
        }
    }
}

/// Running output stream. Dropping it stops the callback.
pub struct AudioOutput {
    _stream: Stream,
}

impl AudioOutput {
    /// Open the configured device and start pulling from `render`
    pub fn new<F>(config: AudioConfig, mut render: F) -> Result<Self, AudioError>
    where
        F: FnMut(&mut [f32], usize) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = select_device(&host, config.device.as_deref())?;
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config.stream_config(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    render(data, channels);
                },
                |err| tracing::error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamFailed(format!("cannot build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFailed(format!("cannot start stream: {}", e)))?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            latency_ms = ?config.buffer_latency_ms(),
            "audio output started"
        );

        Ok(Self { _stream: stream })
    }
}

fn select_device(host: &Host, name: Option<&str>) -> Result<Device, AudioError> {
    let Some(name) = name else {
        return host.default_output_device().ok_or(AudioError::NoDevice);
    };

    let mut devices = host
        .output_devices()
        .map_err(|e| AudioError::InitFailed(format!("cannot enumerate devices: {}", e)))?;
    devices
        .find(|device| device.name().is_ok_and(|n| n == name))
        .ok_or_else(|| AudioError::InitFailed(format!("no output device named {:?}", name)))
}

/// An output device as shown by the `devices` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Output devices of the default host, the default one marked
pub fn output_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let default = host.default_output_device().and_then(|d| d.name().ok());

    let Ok(devices) = host.output_devices() else {
        return Vec::new();
    };
    devices
        .filter_map(|device| device.name().ok())
        .map(|name| DeviceInfo {
            is_default: default.as_deref() == Some(name.as_str()),
            name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_config_default() {
        let config = AudioConfig::default();
        assert_eq!(config.device, None);
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, None);
        assert_eq!(config.channels, 2);
        assert_eq!(config.buffer_latency_ms(), None);
        assert_eq!(config.stream_config().buffer_size, BufferSize::Default);
    }

    #[test]
    fn test_fixed_buffer() {
        let config = AudioConfig {
            buffer_size: Some(512),
            ..Default::default()
        };
        let latency = config.buffer_latency_ms().unwrap();
        assert!((latency - 11.6).abs() < 0.1);
        assert_eq!(config.stream_config().buffer_size, BufferSize::Fixed(512));
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let host = cpal::default_host();
        let result = select_device(&host, Some("no such device 7f3a"));
        assert!(matches!(
            result,
            Err(AudioError::InitFailed(_))
        ));
    }

    #[test]
    fn test_device_listing_marks_at_most_one_default() {
        let devices = output_devices();
        assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
    }
}
