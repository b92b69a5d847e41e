//! Test signal generation
//!
//! `SineWave` is the pull-based synthesis source handed to the output
//! stream; `OutputDeviceGenerator` owns at most one such stream.

use super::driver::{AudioError, OutputDriver, OutputStream};
use std::f64::consts::PI;
use tracing::{info, warn};

/// Pure sine source, `sin(2π·f·t)` evaluated per frame
#[derive(Debug, Clone)]
pub struct SineWave {
    frequency: f64,
    angular_frequency: f64,
    seconds_per_frame: f64,
    frame_index: u64,
}

impl SineWave {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            angular_frequency: 2.0 * PI * frequency,
            seconds_per_frame: 1.0 / sample_rate.max(1) as f64,
            frame_index: 0,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sample_rate(&self) -> u32 {
        (1.0 / self.seconds_per_frame).round() as u32
    }

    /// Next sample, advancing one frame
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let t = self.frame_index as f64 * self.seconds_per_frame;
        self.frame_index += 1;
        (t * self.angular_frequency).sin() as f32
    }

    /// Fill an interleaved buffer, same sample on every channel
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize, volume: f32) {
        for frame in data.chunks_mut(channels.max(1)) {
            let sample = self.next_sample() * volume;
            frame.fill(sample);
        }
    }
}

/// Drives the output device with a sine wave on request
pub struct OutputDeviceGenerator<D: OutputDriver> {
    driver: D,
    stream: Option<D::Stream>,
    frequency: Option<f64>,
}

impl<D: OutputDriver> OutputDeviceGenerator<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            stream: None,
            frequency: None,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.stream.is_some()
    }

    /// Frequency currently played, if any
    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    /// Open the output stream and start playing
    ///
    /// Already generating is not an error: the call logs a warning and keeps
    /// the running stream.
    pub fn start_generation(
        &mut self,
        device_index: usize,
        frequency: f64,
        sample_rate: u32,
        volume: f32,
    ) -> Result<(), AudioError> {
        if self.is_generating() {
            warn!("The output device generator is already running");
            return Ok(());
        }

        let stream = self.driver.open_output_stream(
            device_index,
            SineWave::new(frequency, sample_rate),
            volume.clamp(0.0, 1.0),
        )?;

        info!(device_index, frequency, sample_rate, "Generation started");
        self.stream = Some(stream);
        self.frequency = Some(frequency);
        Ok(())
    }

    /// Change the gain of the running stream; no-op when idle
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(stream) = self.stream.as_mut() {
            stream.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    /// Close the output stream; no-op when idle
    pub fn stop_generation(&mut self) {
        if self.stream.take().is_some() {
            info!("Generation stopped");
        }
        self.frequency = None;
    }
}
