//! Calibration and frequency-sweep state machines
//!
//! Everything here runs on one cooperative thread: [`ImpedanceMeter::tick`]
//! advances the active job by one step and never blocks.

pub mod acquisition;
pub mod calibration;
pub mod events;
pub mod meter;
pub mod sweep;
pub mod test_generation;

pub use calibration::{CalibrationKind, CalibrationState};
pub use events::{EventSink, MeterEvent};
pub use meter::{ImpedanceMeter, JobKind};
pub use sweep::{octave_scaler, SweepFrequencies, OCTAVE_FACTOR};

use crate::audio::{AudioError, InputDeviceListener, InputDriver, OutputDeviceGenerator, OutputDriver, SampleCollector};
use crate::settings::GeneralSettings;
use thiserror::Error;

/// Terminal failure of a calibration, sweep or test-generation run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("There must be two channels of LineIn to carry out measurements (found {0}). Check your connections and try again.")]
    ChannelCount(usize),

    #[error("Impedance is measured as NaN over an extended period of time. Check your circuit, its connection to the soundcard and try again.")]
    NanTimeout,

    #[error("A signal window at {frequency} Hz needs {frames} frames but the sample buffer holds {capacity}")]
    WindowTooLarge {
        frequency: f64,
        frames: usize,
        capacity: usize,
    },

    #[error("A signal window at {frequency} Hz holds no frames")]
    EmptyWindow { frequency: f64 },

    #[error("Audio device error: {0}")]
    Device(#[from] AudioError),

    #[error("Interrupted by another run")]
    Interrupted,
}

/// The generator/listener pair a run drives
pub(crate) struct Devices<'a, I: InputDriver, O: OutputDriver> {
    pub listener: &'a mut InputDeviceListener<I>,
    pub generator: &'a mut OutputDeviceGenerator<O>,
}

impl<I: InputDriver, O: OutputDriver> Devices<'_, I, O> {
    /// The input device must capture exactly two channels
    pub fn check_channel_count(&self, settings: &GeneralSettings) -> Result<(), MeasurementError> {
        let channels = self
            .listener
            .channel_count(settings.input_device_index, settings.sample_rate)?;
        if channels != 2 {
            return Err(MeasurementError::ChannelCount(channels));
        }
        Ok(())
    }

    /// Start generating `frequency` and listening to both channels
    ///
    /// On failure nothing is left running.
    pub fn start(&mut self, settings: &GeneralSettings, frequency: f64) -> Result<(), MeasurementError> {
        let frames = SampleCollector::window_len(
            frequency,
            settings.sample_rate as f64,
            settings.signal_intervals_count as usize,
        );
        if frames == 0 {
            return Err(MeasurementError::EmptyWindow { frequency });
        }
        let capacity = self.listener.collector_capacity();
        if frames > capacity {
            return Err(MeasurementError::WindowTooLarge {
                frequency,
                frames,
                capacity,
            });
        }

        let result = self
            .generator
            .start_generation(
                settings.output_device_index,
                frequency,
                settings.sample_rate,
                settings.output_volume,
            )
            .and_then(|_| {
                self.listener.start_listening(
                    settings.input_device_index,
                    settings.sample_rate,
                    settings.channel_offsets(),
                )
            });

        if let Err(e) = result {
            self.stop();
            return Err(e.into());
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.generator.stop_generation();
        self.listener.stop_listening();
    }
}
