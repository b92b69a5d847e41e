//! Gain, open and short calibration
//!
//! Each run averages one complex constant at the calibration frequency and
//! publishes it into [`CalibrationState`], which sweeps read on every tick.

use super::acquisition::{Acquisition, AcquisitionStep};
use super::events::{EventSink, MeterEvent};
use super::{Devices, MeasurementError};
use crate::audio::{InputDriver, OutputDriver};
use crate::complex::{ComplexExt, ComplexNumber};
use crate::impedance::{compute_gain_ratio, compute_impedance};
use crate::settings::GeneralSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Line input impedance assumed before an open calibration, in Ω
pub const DEFAULT_LINE_INPUT_IMPEDANCE: f64 = 1e9;

/// Smallest plausible line input impedance, in Ω
pub const MIN_LINE_INPUT_IMPEDANCE: f64 = 1.0;

/// Largest plausible ground impedance, in Ω
pub const MAX_GROUND_IMPEDANCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationKind {
    /// Both inputs on the generator: In/Out channel mismatch
    Gain,
    /// Probes open: the sound card's own input impedance
    Open,
    /// Probes shorted: residual ground impedance
    Short,
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationKind::Gain => "gain",
            CalibrationKind::Open => "open",
            CalibrationKind::Short => "short",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown calibration kind '{0}', expected gain, open or short")]
pub struct ParseCalibrationKindError(String);

impl FromStr for CalibrationKind {
    type Err = ParseCalibrationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gain" => Ok(CalibrationKind::Gain),
            "open" => Ok(CalibrationKind::Open),
            "short" => Ok(CalibrationKind::Short),
            _ => Err(ParseCalibrationKindError(s.to_string())),
        }
    }
}

/// Published calibration constants
///
/// Each constant is `None` until its calibration has run once; the getters
/// fall back to neutral values that leave the calibrated formula equal to
/// the uncalibrated one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    gain_correction_ratio: Option<ComplexNumber>,
    line_input_impedance: Option<ComplexNumber>,
    ground_impedance: Option<ComplexNumber>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 1∠0° when uncalibrated
    pub fn gain_correction_ratio(&self) -> ComplexNumber {
        self.gain_correction_ratio
            .unwrap_or_else(|| ComplexNumber::from_angle(0.0, 1.0))
    }

    /// 1 GΩ when uncalibrated
    pub fn line_input_impedance(&self) -> ComplexNumber {
        self.line_input_impedance
            .unwrap_or_else(|| ComplexNumber::from_angle(0.0, DEFAULT_LINE_INPUT_IMPEDANCE))
    }

    /// 0 Ω when uncalibrated
    pub fn ground_impedance(&self) -> ComplexNumber {
        self.ground_impedance.unwrap_or_default()
    }

    pub fn is_calibrated(&self, kind: CalibrationKind) -> bool {
        match kind {
            CalibrationKind::Gain => self.gain_correction_ratio.is_some(),
            CalibrationKind::Open => self.line_input_impedance.is_some(),
            CalibrationKind::Short => self.ground_impedance.is_some(),
        }
    }

    /// Store a freshly averaged constant
    ///
    /// The ground impedance keeps only its real part.
    ///
    /// # Returns
    /// The value as stored
    pub fn publish(&mut self, kind: CalibrationKind, value: ComplexNumber) -> ComplexNumber {
        match kind {
            CalibrationKind::Gain => *self.gain_correction_ratio.insert(value),
            CalibrationKind::Open => *self.line_input_impedance.insert(value),
            CalibrationKind::Short => *self.ground_impedance.insert(value.as_real()),
        }
    }

    /// Forget every constant
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Warning text for an implausible constant, `None` when it looks sane
pub fn out_of_range_message(kind: CalibrationKind, value: ComplexNumber) -> Option<String> {
    let magnitude = value.magnitude();
    match kind {
        CalibrationKind::Gain => None,
        CalibrationKind::Open if magnitude < MIN_LINE_INPUT_IMPEDANCE => Some(format!(
            "LineIn impedance is measured as too small ({magnitude} Ohm). Check your circuit and try again."
        )),
        CalibrationKind::Short if magnitude > MAX_GROUND_IMPEDANCE => Some(format!(
            "Ground impedance is measured as too big ({magnitude} Ohm). Check your circuit and try again."
        )),
        _ => None,
    }
}

/// One running calibration
pub(crate) struct CalibrationRun {
    kind: CalibrationKind,
    acquisition: Acquisition,
}

impl CalibrationRun {
    /// Check the input, open both streams and start settling
    ///
    /// Failures are reported through `sink`; nothing is left running.
    pub fn start<I: InputDriver, O: OutputDriver>(
        kind: CalibrationKind,
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) -> Option<Self> {
        let started = devices
            .check_channel_count(settings)
            .and_then(|_| devices.start(settings, settings.calibration_frequency));

        if let Err(err) = started {
            Self::fail(kind, err, devices, sink);
            return None;
        }

        info!(%kind, frequency = settings.calibration_frequency, "Calibration started");
        Some(Self {
            kind,
            acquisition: Acquisition::new(settings.calibration_frequency, settings),
        })
    }

    pub fn kind(&self) -> CalibrationKind {
        self.kind
    }

    /// Advance by one tick
    ///
    /// # Returns
    /// `true` once the run is over, successfully or not
    pub fn tick<I: InputDriver, O: OutputDriver>(
        &mut self,
        dt: Duration,
        settings: &GeneralSettings,
        devices: &mut Devices<'_, I, O>,
        state: &mut CalibrationState,
        sink: &mut dyn EventSink,
    ) -> bool {
        let kind = self.kind;
        let frequency = self.acquisition.frequency();
        let sample_rate = settings.sample_rate as f64;
        let reference_resistance = settings.reference_resistance;

        let step = self.acquisition.step(dt, devices.listener, |w| match kind {
            CalibrationKind::Gain => compute_gain_ratio(w.input, w.output, frequency, sample_rate),
            CalibrationKind::Open | CalibrationKind::Short => {
                compute_impedance(w.input, w.output, reference_resistance, frequency, sample_rate)
            }
        });

        match step {
            AcquisitionStep::Pending | AcquisitionStep::Progressed { .. } => false,
            AcquisitionStep::Failed(err) => {
                Self::fail(kind, err, devices, sink);
                true
            }
            AcquisitionStep::Finished(result) => {
                devices.stop();

                let value = state.publish(kind, result.value);
                info!(
                    %kind,
                    re = value.re,
                    im = value.im,
                    magnitude = value.magnitude(),
                    phase_deg = value.angle_degrees(),
                    input_rms = result.input_rms,
                    output_rms = result.output_rms,
                    "Calibration finished"
                );
                sink.emit(MeterEvent::CalibrationFinished { kind, value });

                if let Some(message) = out_of_range_message(kind, value) {
                    warn!(%kind, "{message}");
                    sink.emit(MeterEvent::CalibrationOutOfRange { kind, value, message });
                }
                true
            }
        }
    }

    /// Tear down and report a terminal failure
    pub fn fail<I: InputDriver, O: OutputDriver>(
        kind: CalibrationKind,
        err: MeasurementError,
        devices: &mut Devices<'_, I, O>,
        sink: &mut dyn EventSink,
    ) {
        devices.stop();
        error!(%kind, "Calibration failed: {err}");
        sink.emit(MeterEvent::CalibrationError {
            kind,
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_neutral() {
        let state = CalibrationState::new();

        assert_eq!(state.gain_correction_ratio(), ComplexNumber::new(1.0, 0.0));
        assert_eq!(state.line_input_impedance(), ComplexNumber::new(1e9, 0.0));
        assert_eq!(state.ground_impedance(), ComplexNumber::new(0.0, 0.0));
        assert!(!state.is_calibrated(CalibrationKind::Gain));
    }

    #[test]
    fn test_publish_overwrites() {
        let mut state = CalibrationState::new();
        state.publish(CalibrationKind::Open, ComplexNumber::new(1.0e4, -5.0));
        state.publish(CalibrationKind::Open, ComplexNumber::new(2.0e4, -5.0));

        assert_eq!(state.line_input_impedance(), ComplexNumber::new(2.0e4, -5.0));
        assert!(state.is_calibrated(CalibrationKind::Open));

        state.clear();
        assert!(!state.is_calibrated(CalibrationKind::Open));
    }

    #[test]
    fn test_ground_keeps_real_part() {
        let mut state = CalibrationState::new();
        let stored = state.publish(CalibrationKind::Short, ComplexNumber::new(0.3, 0.2));

        assert_eq!(stored, ComplexNumber::new(0.3, 0.0));
        assert_eq!(state.ground_impedance(), stored);
    }

    #[test]
    fn test_out_of_range_thresholds() {
        assert!(out_of_range_message(CalibrationKind::Open, ComplexNumber::new(0.5, 0.0)).is_some());
        assert!(out_of_range_message(CalibrationKind::Open, ComplexNumber::new(1.0e5, 0.0)).is_none());
        assert!(out_of_range_message(CalibrationKind::Short, ComplexNumber::new(2.0, 0.0)).is_some());
        assert!(out_of_range_message(CalibrationKind::Short, ComplexNumber::new(0.1, 0.0)).is_none());
        assert!(out_of_range_message(CalibrationKind::Gain, ComplexNumber::new(100.0, 0.0)).is_none());

        let message = out_of_range_message(CalibrationKind::Short, ComplexNumber::new(3.0, 4.0)).unwrap();
        assert!(message.starts_with("Ground impedance is measured as too big (5 Ohm)"));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Gain".parse::<CalibrationKind>().unwrap(), CalibrationKind::Gain);
        assert_eq!(" short ".parse::<CalibrationKind>().unwrap(), CalibrationKind::Short);
        assert!("closed".parse::<CalibrationKind>().is_err());
        assert_eq!(CalibrationKind::Open.to_string(), "open");
    }
}
