//! Audio output device management via cpal.
//!
//! Device enumeration and config selection are narrowed to f32 output,
//! the pipeline's internal format throughout. The callback itself lives
//! in `playback::player` — this module only owns getting a
//! `cpal::Stream` running with whatever closure the Player hands it.

use crate::error::{Error, PlaybackError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tracing::{debug, info, warn};

pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioOutput {
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .filter_map(|device| device.name().ok())
            .collect();
        Ok(devices)
    }

    /// Open a device and pick a config matching `sample_rate`/`channels`,
    /// falling back to the device's default config if no exact match
    /// exists.
    pub fn new(device_name: Option<&str>, sample_rate: u32, channels: u16) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| PlaybackError::Device(e.to_string()))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| PlaybackError::Device(format!("device '{name}' not found")))?,
            None => host
                .default_output_device()
                .ok_or(PlaybackError::NoDevice)?,
        };

        info!(device = %device.name().unwrap_or_default(), "opening audio output device");

        let config = Self::select_config(&device, sample_rate, channels)?;
        debug!(?config, "selected stream config");

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    fn select_config(device: &Device, sample_rate: u32, channels: u16) -> Result<StreamConfig> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        let exact = supported.find(|c| {
            c.channels() == channels
                && c.sample_format() == SampleFormat::F32
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
        });

        if let Some(supported_config) = exact {
            return Ok(supported_config
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config());
        }

        warn!(
            sample_rate,
            channels, "no exact device config match, falling back to device default"
        );
        let default_config = device
            .default_output_config()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        if default_config.sample_format() != SampleFormat::F32 {
            return Err(PlaybackError::UnsupportedSampleFormat(default_config.sample_format()).into());
        }
        Ok(default_config.config())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start the stream. `fill` is called on the device's real-time
    /// thread with the exact output buffer to populate (already
    /// interleaved per `channels()`); it must never allocate or block.
    pub fn start<F>(&mut self, mut fill: F) -> Result<()>
    where
        F: FnMut(&mut [f32]) + Send + 'static,
    {
        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| fill(data),
                |err| warn!(error = %err, "audio stream error"),
                None,
            )
            .map_err(|e| Error::from(PlaybackError::Device(e.to_string())))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stream = None;
    }
}
