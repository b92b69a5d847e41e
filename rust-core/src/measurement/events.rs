//! Notifications emitted by the meter
//!
//! These are the only outputs of the measurement core. A presentation layer
//! receives them through an [`EventSink`].

use super::calibration::CalibrationKind;
use crate::complex::ComplexNumber;
use crate::impedance::ImpedanceMeasurement;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    MeasuringStarted,
    /// Fraction of the frequency range covered, 0..=1
    MeasuringProgress(f64),
    ImpedanceMeasured(ImpedanceMeasurement),
    MeasuringFinished,
    MeasuringError(String),

    CalibrationFinished {
        kind: CalibrationKind,
        value: ComplexNumber,
    },
    /// Published, but outside the plausible range for its kind
    CalibrationOutOfRange {
        kind: CalibrationKind,
        value: ComplexNumber,
        message: String,
    },
    CalibrationError {
        kind: CalibrationKind,
        message: String,
    },

    TestGenerationStarted,
    TestGenerationProgress(f64),
    TestGenerationFinished {
        left_rms: f64,
        right_rms: f64,
        phase_shift_rad: f64,
    },
    TestGenerationError(String),
}

/// Receiver of [`MeterEvent`]s
pub trait EventSink {
    fn emit(&mut self, event: MeterEvent);
}

impl EventSink for Vec<MeterEvent> {
    fn emit(&mut self, event: MeterEvent) {
        self.push(event);
    }
}

impl EventSink for Sender<MeterEvent> {
    fn emit(&mut self, event: MeterEvent) {
        // A dropped receiver means nobody is listening any more
        let _ = self.send(event);
    }
}
