//! Input device listener
//!
//! Owns the capture stream and the [`SampleCollector`]. Frames are drained
//! from the stream once per tick by [`InputDeviceListener::poll`]; the
//! collector itself is only ever touched from the measurement loop.

use super::collector::{SampleCollector, SampleWindows, DEFAULT_COLLECTOR_CAPACITY};
use super::driver::{AudioError, InputDriver, InputStream};
use crate::settings::ChannelOffsets;
use tracing::{info, warn};

/// Frames drained from the stream per read call
const SCRATCH_FRAMES: usize = 1024;

pub struct InputDeviceListener<D: InputDriver> {
    driver: D,
    stream: Option<D::Stream>,
    collector: SampleCollector,
    scratch: Vec<f32>,
}

impl<D: InputDriver> InputDeviceListener<D> {
    pub fn new(driver: D) -> Self {
        Self::with_capacity(driver, DEFAULT_COLLECTOR_CAPACITY)
    }

    /// Listener whose collector holds `capacity` frames per channel
    pub fn with_capacity(driver: D, capacity: usize) -> Self {
        Self {
            driver,
            stream: None,
            collector: SampleCollector::new(capacity, ChannelOffsets { input: 0, output: 1 }),
            scratch: Vec::new(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.stream.is_some()
    }

    pub fn collector_capacity(&self) -> usize {
        self.collector.capacity()
    }

    /// Rate of the open stream, if any
    pub fn sample_rate(&self) -> Option<u32> {
        self.stream.as_ref().map(|s| s.sample_rate())
    }

    pub fn channel_count(&self, device_index: usize, sample_rate: u32) -> Result<usize, AudioError> {
        self.driver.input_channel_count(device_index, sample_rate)
    }

    /// Open the capture stream
    ///
    /// Already listening is not an error: the call logs a warning and keeps
    /// the running stream.
    pub fn start_listening(
        &mut self,
        device_index: usize,
        sample_rate: u32,
        offsets: ChannelOffsets,
    ) -> Result<(), AudioError> {
        if self.is_listening() {
            warn!("The input device listener is already running");
            return Ok(());
        }

        let stream = self.driver.open_input_stream(device_index, sample_rate)?;
        let channels = stream.channel_count();
        if offsets.input >= channels || offsets.output >= channels {
            return Err(AudioError::InvalidChannelOffsets {
                input: offsets.input,
                output: offsets.output,
                channels,
            });
        }

        self.scratch = vec![0.0; SCRATCH_FRAMES * channels.max(1)];
        self.collector.set_offsets(offsets);
        self.collector.reset();

        info!(device_index, sample_rate, channels, "Listening started");
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the capture stream and forget collected frames
    pub fn stop_listening(&mut self) {
        if self.stream.take().is_some() {
            info!("Listening stopped");
        }
        self.collector.reset();
    }

    /// Move every frame that arrived since the last tick into the collector
    pub fn poll(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let channels = stream.channel_count();
        loop {
            let read = stream.read_frames(&mut self.scratch);
            if read == 0 {
                break;
            }

            self.collector.append_interleaved(&self.scratch[..read], channels);

            if read < self.scratch.len() {
                break;
            }
        }
    }

    /// Drop frames collected so far, e.g. those captured during a transient
    pub fn discard_filled_samples(&mut self) {
        self.collector.reset();
    }

    /// Windows of `intervals_count` periods of `frequency`, releasing them
    ///
    /// `None` while not listening or not enough frames arrived yet.
    pub fn try_get_and_release_filled_samples(
        &mut self,
        frequency: f64,
        intervals_count: usize,
    ) -> Option<SampleWindows<'_>> {
        let sample_rate = self.sample_rate()? as f64;
        self.collector
            .try_get_and_release(frequency, sample_rate, intervals_count)
    }
}
