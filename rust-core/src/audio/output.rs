//! Audio output playback using cpal
//!
//! The data callback synthesizes the sine wave itself; volume is shared with
//! the callback through an atomic seeded before the stream starts.

use super::driver::{AudioError, OutputDriver, OutputStream};
use super::generator::SineWave;
use super::input::{select_config, CpalDriver};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::error;

fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig, AudioError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;
    select_config(ranges, sample_rate)
}

/// Live playback stream
pub struct CpalOutputStream {
    // Dropping the stream closes the device
    _stream: Stream,
    volume: Arc<AtomicU32>,
}

impl OutputStream for CpalOutputStream {
    fn set_volume(&mut self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }
}

impl OutputDriver for CpalDriver {
    type Stream = CpalOutputStream;

    fn open_output_stream(
        &mut self,
        device_index: usize,
        wave: SineWave,
        volume: f32,
    ) -> Result<CpalOutputStream, AudioError> {
        let device = self.output_device(device_index)?;
        let config = output_config(&device, wave.sample_rate())?;
        let channels = config.channels as usize;

        let volume = Arc::new(AtomicU32::new(volume.to_bits()));
        let callback_volume = Arc::clone(&volume);
        let mut wave = wave;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let gain = f32::from_bits(callback_volume.load(Ordering::Relaxed));
                    wave.fill_interleaved(data, channels, gain);
                },
                move |err| {
                    error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))?;

        Ok(CpalOutputStream {
            _stream: stream,
            volume,
        })
    }
}
