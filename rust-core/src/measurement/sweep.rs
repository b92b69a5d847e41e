//! Fractional-octave impedance sweep
//!
//! Frequencies grow geometrically from the low cutoff; the point at or just
//! above the high cutoff is measured too. Every point runs one
//! [`Acquisition`] with the calibrated impedance formula.

use super::acquisition::{Acquisition, AcquisitionStep};
use super::calibration::CalibrationState;
use super::events::{EventSink, MeterEvent};
use super::{Devices, MeasurementError};
use crate::audio::{InputDriver, OutputDriver};
use crate::complex::ComplexExt;
use crate::impedance::{compute_test_impedance, ImpedanceMeasurement};
use crate::settings::GeneralSettings;
use std::time::Duration;
use tracing::{debug, error, info};

/// Empirical step factor, divided by the points per octave
pub const OCTAVE_FACTOR: f64 = 0.7032;

/// Relative step between two sweep points
pub fn octave_scaler(points_per_octave: u32) -> f64 {
    OCTAVE_FACTOR / points_per_octave.max(1) as f64
}

/// Sweep points from `low` up to the first one at or above `high`
#[derive(Debug, Clone)]
pub struct SweepFrequencies {
    next: Option<f64>,
    high: f64,
    scaler: f64,
}

impl SweepFrequencies {
    pub fn new(low: f64, high: f64, scaler: f64) -> Self {
        let next = (low > 0.0 && low.is_finite()).then_some(low);
        Self { next, high, scaler }
    }

    pub fn from_settings(settings: &GeneralSettings) -> Self {
        Self::new(
            settings.low_cutoff_frequency,
            settings.high_cutoff_frequency,
            octave_scaler(settings.frequency_increment.points_per_octave()),
        )
    }

    pub fn scaler(&self) -> f64 {
        self.scaler
    }
}

impl Iterator for SweepFrequencies {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let current = self.next?;
        let following = current * (1.0 + self.scaler);

        // The first point is always measured; the overshoot term lets the
        // high cutoff itself be covered
        self.next = (self.scaler > 0.0 && following < self.high + current * self.scaler).then_some(following);
        Some(current)
    }
}

/// Linear position of `value` in `[low, high]`, clamped to 0..=1
fn inverse_lerp(low: f64, high: f64, value: f64) -> f64 {
    if high == low {
        return 0.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

pub(crate) struct SweepRun {
    frequencies: SweepFrequencies,
    acquisition: Acquisition,
    low: f64,
    high: f64,
}

impl SweepRun {
    /// Emit `MeasuringStarted`, check the input and start the first point
    pub fn start<I: InputDriver, O: OutputDriver>(
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) -> Option<Self> {
        sink.emit(MeterEvent::MeasuringStarted);

        let mut frequencies = SweepFrequencies::from_settings(settings);
        let Some(first) = frequencies.next() else {
            sink.emit(MeterEvent::MeasuringFinished);
            return None;
        };

        let started = devices
            .check_channel_count(settings)
            .and_then(|_| devices.start(settings, first));
        if let Err(err) = started {
            Self::fail(err, devices, sink);
            return None;
        }

        info!(
            low = settings.low_cutoff_frequency,
            high = settings.high_cutoff_frequency,
            scaler = frequencies.scaler(),
            "Sweep started"
        );

        Some(Self {
            frequencies,
            acquisition: Acquisition::new(first, settings),
            low: settings.low_cutoff_frequency,
            high: settings.high_cutoff_frequency,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.acquisition.frequency()
    }

    /// Sweep position after `iteration` readings at the current point
    fn progress(&self, iteration: u32) -> f64 {
        let current = self.acquisition.frequency();
        let next = current * (1.0 + self.frequencies.scaler());
        let t = iteration as f64 / self.acquisition.iterations() as f64;
        inverse_lerp(self.low, self.high, lerp(current, next, t))
    }

    /// Advance by one tick
    ///
    /// Calibration constants are read anew on every reading.
    ///
    /// # Returns
    /// `true` once the sweep is over, successfully or not
    pub fn tick<I: InputDriver, O: OutputDriver>(
        &mut self,
        dt: Duration,
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        calibration: &CalibrationState,
        sink: &mut dyn EventSink,
    ) -> bool {
        let frequency = self.acquisition.frequency();
        let sample_rate = settings.sample_rate as f64;

        let step = self.acquisition.step(dt, devices.listener, |w| {
            compute_test_impedance(
                w.input,
                w.output,
                settings.reference_resistance,
                calibration.gain_correction_ratio(),
                calibration.line_input_impedance(),
                calibration.ground_impedance(),
                frequency,
                sample_rate,
            )
        });

        match step {
            AcquisitionStep::Pending => false,
            AcquisitionStep::Progressed { iteration } => {
                sink.emit(MeterEvent::MeasuringProgress(self.progress(iteration)));
                false
            }
            AcquisitionStep::Failed(err) => {
                Self::fail(err, devices, sink);
                true
            }
            AcquisitionStep::Finished(result) => {
                sink.emit(MeterEvent::MeasuringProgress(self.progress(self.acquisition.iterations())));
                devices.stop();

                debug!(
                    frequency,
                    input_rms = result.input_rms,
                    output_rms = result.output_rms,
                    rms_ratio = result.input_rms / result.output_rms,
                    "Channel levels"
                );
                info!(
                    frequency,
                    re = result.value.re,
                    im = result.value.im,
                    magnitude = result.value.magnitude(),
                    phase_deg = result.value.angle_degrees(),
                    "Impedance measured"
                );
                sink.emit(MeterEvent::ImpedanceMeasured(ImpedanceMeasurement::new(
                    result.value,
                    frequency,
                )));

                let Some(next) = self.frequencies.next() else {
                    info!(last_frequency = frequency, "Sweep finished");
                    sink.emit(MeterEvent::MeasuringFinished);
                    return true;
                };

                if let Err(err) = devices.start(settings, next) {
                    Self::fail(err, devices, sink);
                    return true;
                }
                self.acquisition = Acquisition::new(next, settings);
                false
            }
        }
    }

    fn fail<I: InputDriver, O: OutputDriver>(
        err: MeasurementError,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) {
        devices.stop();
        error!("Sweep failed: {err}");
        sink.emit(MeterEvent::MeasuringError(err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octave_scaler() {
        assert!((octave_scaler(24) - 0.0293).abs() < 1e-12);
        assert!((octave_scaler(48) - 0.01465).abs() < 1e-12);
    }

    #[test]
    fn test_sweep_200_to_1000_hz() {
        let scaler = octave_scaler(24);
        let points: Vec<f64> = SweepFrequencies::new(200.0, 1000.0, scaler).collect();

        assert_eq!(points[0], 200.0);
        for pair in points.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!((pair[1] / pair[0] - (1.0 + scaler)).abs() < 1e-12);
        }

        // Ends on the first point at or above the high cutoff
        let last = *points.last().unwrap();
        assert!(last >= 1000.0);
        assert!(last / (1.0 + scaler) < 1000.0);
        assert_eq!(points.len(), 57);
    }

    #[test]
    fn test_single_point_when_low_reaches_high() {
        let points: Vec<f64> = SweepFrequencies::new(1000.0, 1000.0, octave_scaler(24)).collect();
        assert_eq!(points, vec![1000.0]);

        let points: Vec<f64> = SweepFrequencies::new(2000.0, 1000.0, octave_scaler(24)).collect();
        assert_eq!(points, vec![2000.0]);
    }

    #[test]
    fn test_degenerate_inputs_terminate() {
        assert_eq!(SweepFrequencies::new(0.0, 1000.0, 0.1).count(), 0);
        assert_eq!(SweepFrequencies::new(100.0, 1000.0, 0.0).count(), 1);
    }

    #[test]
    fn test_progress_interpolation() {
        assert_eq!(inverse_lerp(200.0, 1000.0, 600.0), 0.5);
        assert_eq!(inverse_lerp(200.0, 1000.0, 1200.0), 1.0);
        assert_eq!(inverse_lerp(200.0, 1000.0, 100.0), 0.0);
        assert_eq!(lerp(200.0, 300.0, 0.25), 225.0);
    }
}
