//! Audio input capture using cpal
//!
//! The data callback pushes whole interleaved frames into the lock-free ring
//! buffer; nothing else happens on the real-time thread.

use super::buffer::{AudioConsumer, AudioRingBuffer};
use super::driver::{AudioError, InputDriver, InputStream};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};
use tracing::error;

/// Seconds of audio the ring buffer can hold between two ticks
const RING_BUFFER_SECONDS: usize = 2;

/// Sound devices of the platform's default host, addressed by index
pub struct CpalDriver {
    host: Host,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub(crate) fn input_device(&self, index: usize) -> Result<Device, AudioError> {
        self.host
            .input_devices()
            .map_err(|e| AudioError::DeviceList(e.to_string()))?
            .nth(index)
            .ok_or(AudioError::NoDevice(index))
    }

    pub(crate) fn output_device(&self, index: usize) -> Result<Device, AudioError> {
        self.host
            .output_devices()
            .map_err(|e| AudioError::DeviceList(e.to_string()))?
            .nth(index)
            .ok_or(AudioError::NoDevice(index))
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Widest f32 configuration among `ranges` running at `sample_rate`
pub(crate) fn select_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
) -> Result<StreamConfig, AudioError> {
    ranges
        .into_iter()
        .filter(|range| {
            range.sample_format() == SampleFormat::F32
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
        })
        .max_by_key(|range| range.channels())
        .map(|range| range.with_sample_rate(SampleRate(sample_rate)).config())
        .ok_or(AudioError::UnsupportedSampleRate(sample_rate))
}

fn input_config(device: &Device, sample_rate: u32) -> Result<StreamConfig, AudioError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
    select_config(ranges, sample_rate)
}

/// Live capture stream feeding a ring buffer
pub struct CpalInputStream {
    // Dropping the stream closes the device
    _stream: Stream,
    consumer: AudioConsumer,
    channels: usize,
    sample_rate: u32,
}

impl InputStream for CpalInputStream {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_frames(&mut self, buffer: &mut [f32]) -> usize {
        self.consumer.read_frames(buffer)
    }
}

impl InputDriver for CpalDriver {
    type Stream = CpalInputStream;

    fn open_input_stream(&mut self, device_index: usize, sample_rate: u32) -> Result<CpalInputStream, AudioError> {
        let device = self.input_device(device_index)?;
        let config = input_config(&device, sample_rate)?;
        let channels = config.channels as usize;

        let rb = AudioRingBuffer::new(sample_rate as usize * RING_BUFFER_SECONDS, channels);
        let (mut producer, consumer) = rb.split();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Frames that do not fit are dropped
                    producer.write_frames(data);
                },
                move |err| {
                    error!("Audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))?;

        Ok(CpalInputStream {
            _stream: stream,
            consumer,
            channels,
            sample_rate,
        })
    }

    fn input_channel_count(&self, device_index: usize, sample_rate: u32) -> Result<usize, AudioError> {
        let device = self.input_device(device_index)?;
        Ok(input_config(&device, sample_rate)?.channels as usize)
    }
}
