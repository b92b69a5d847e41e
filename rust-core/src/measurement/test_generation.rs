//! Wiring check without any DUT math
//!
//! Plays the calibration tone and reports both channel levels and the phase
//! shift of the right channel against the left one.

use super::acquisition::{Acquisition, AcquisitionStep};
use super::events::{EventSink, MeterEvent};
use super::{Devices, MeasurementError};
use crate::audio::{InputDriver, OutputDriver};
use crate::complex::ComplexExt;
use crate::impedance::compute_gain_ratio;
use crate::settings::GeneralSettings;
use std::time::Duration;
use tracing::{error, info};

pub(crate) struct TestGenerationRun {
    acquisition: Acquisition,
}

impl TestGenerationRun {
    pub fn start<I: InputDriver, O: OutputDriver>(
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) -> Option<Self> {
        sink.emit(MeterEvent::TestGenerationStarted);

        let started = devices
            .check_channel_count(settings)
            .and_then(|_| devices.start(settings, settings.calibration_frequency));
        if let Err(err) = started {
            Self::fail(err, devices, sink);
            return None;
        }

        Some(Self {
            acquisition: Acquisition::new(settings.calibration_frequency, settings),
        })
    }

    /// # Returns
    /// `true` once the run is over
    pub fn tick<I: InputDriver, O: OutputDriver>(
        &mut self,
        dt: Duration,
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) -> bool {
        let frequency = self.acquisition.frequency();
        let sample_rate = settings.sample_rate as f64;

        // Right over left
        let step = self.acquisition.step(dt, devices.listener, |w| {
            compute_gain_ratio(w.output, w.input, frequency, sample_rate)
        });

        let iterations = self.acquisition.iterations() as f64;
        match step {
            AcquisitionStep::Pending => false,
            AcquisitionStep::Progressed { iteration } => {
                sink.emit(MeterEvent::TestGenerationProgress(iteration as f64 / iterations));
                false
            }
            AcquisitionStep::Failed(err) => {
                Self::fail(err, devices, sink);
                true
            }
            AcquisitionStep::Finished(result) => {
                sink.emit(MeterEvent::TestGenerationProgress(1.0));
                devices.stop();

                let phase_shift_rad = result.value.angle();
                info!(
                    left_rms = result.input_rms,
                    right_rms = result.output_rms,
                    rms_ratio = result.input_rms / result.output_rms,
                    phase_shift_deg = phase_shift_rad.to_degrees(),
                    "Test generation finished"
                );
                sink.emit(MeterEvent::TestGenerationFinished {
                    left_rms: result.input_rms,
                    right_rms: result.output_rms,
                    phase_shift_rad,
                });
                true
            }
        }
    }

    fn fail<I: InputDriver, O: OutputDriver>(
        err: MeasurementError,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) {
        devices.stop();
        error!("Test generation failed: {err}");
        sink.emit(MeterEvent::TestGenerationError(err.to_string()));
    }
}
