//! Impedance math (ZRLC engine)
//!
//! Pure functions turning a pair of captured channel windows into a complex
//! impedance, plus the R/L/C views derived from one measurement.

use crate::complex::{ComplexExt, ComplexNumber};
use crate::spectrum::complex_peak;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Denominators below this magnitude are treated as zero
const MIN_DENOMINATOR_MAGNITUDE: f64 = 1e-12;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ImpedanceError {
    #[error("Impedance denominator vanished (|d| = {0:e}); input and output phasors are indistinguishable")]
    DegenerateDenominator(f64),

    #[error("Impedance is not a finite number")]
    NonFinite,
}

/// One calibrated impedance sample of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceMeasurement {
    pub impedance: ComplexNumber,
    pub frequency_hz: f64,
}

impl ImpedanceMeasurement {
    pub fn new(impedance: ComplexNumber, frequency_hz: f64) -> Self {
        Self {
            impedance,
            frequency_hz,
        }
    }
}

/// Divide, refusing zero and non-finite results
fn guarded_div(numerator: ComplexNumber, denominator: ComplexNumber) -> Result<ComplexNumber, ImpedanceError> {
    let magnitude = denominator.magnitude();
    if !(magnitude > MIN_DENOMINATOR_MAGNITUDE) {
        return Err(ImpedanceError::DegenerateDenominator(magnitude));
    }

    finite(numerator / denominator)
}

fn finite(value: ComplexNumber) -> Result<ComplexNumber, ImpedanceError> {
    if value.is_finite_value() {
        Ok(value)
    } else {
        Err(ImpedanceError::NonFinite)
    }
}

/// In/Out phasor ratio at `frequency`
pub fn compute_gain_ratio(
    input_samples: &[f32],
    output_samples: &[f32],
    frequency: f64,
    sample_rate: f64,
) -> Result<ComplexNumber, ImpedanceError> {
    let in_peak = complex_peak(input_samples, frequency, sample_rate);
    let out_peak = complex_peak(output_samples, frequency, sample_rate);

    guarded_div(in_peak, out_peak)
}

/// Uncalibrated impedance from the voltage-divider relation
///
/// `Z = R_ref / (V_in / V_out - 1)`
///
/// # Arguments
/// * `input_samples` - Window of the input (DUT) channel
/// * `output_samples` - Window of the output (reference) channel, same frame span
/// * `reference_resistance` - Known series resistor in Ω
/// * `frequency` - Generated tone in Hz
/// * `sample_rate` - Capture rate in Hz
pub fn compute_impedance(
    input_samples: &[f32],
    output_samples: &[f32],
    reference_resistance: f64,
    frequency: f64,
    sample_rate: f64,
) -> Result<ComplexNumber, ImpedanceError> {
    let ratio = compute_gain_ratio(input_samples, output_samples, frequency, sample_rate)?;
    impedance_from_ratio(ratio, reference_resistance)
}

/// `R_ref / (ratio - 1)` with the zero-denominator guard
pub fn impedance_from_ratio(ratio: ComplexNumber, reference_resistance: f64) -> Result<ComplexNumber, ImpedanceError> {
    guarded_div(ComplexNumber::new(reference_resistance, 0.0), ratio - 1.0)
}

/// Impedance corrected by the three calibration constants
///
/// The output phasor is scaled by `gain_correction_ratio` first, then
/// `Z = out·Zr·R / (Zr·(in - out) - out·R) - Zg`.
#[allow(clippy::too_many_arguments)]
pub fn compute_test_impedance(
    input_samples: &[f32],
    output_samples: &[f32],
    reference_resistance: f64,
    gain_correction_ratio: ComplexNumber,
    line_input_impedance: ComplexNumber,
    ground_impedance: ComplexNumber,
    frequency: f64,
    sample_rate: f64,
) -> Result<ComplexNumber, ImpedanceError> {
    let in_peak = complex_peak(input_samples, frequency, sample_rate);
    let out_peak = gain_correction_ratio * complex_peak(output_samples, frequency, sample_rate);

    test_impedance_from_peaks(
        in_peak,
        out_peak,
        reference_resistance,
        line_input_impedance,
        ground_impedance,
    )
}

/// Calibrated formula on already extracted (and gain-corrected) phasors
pub fn test_impedance_from_peaks(
    in_peak: ComplexNumber,
    out_peak: ComplexNumber,
    reference_resistance: f64,
    line_input_impedance: ComplexNumber,
    ground_impedance: ComplexNumber,
) -> Result<ComplexNumber, ImpedanceError> {
    let zr = line_input_impedance;
    let numerator = out_peak * zr * reference_resistance;
    let denominator = zr * (in_peak - out_peak) - out_peak * reference_resistance;

    // The raw quotient scales with |Zr|, so judge it relative to the numerator
    let scale = numerator.magnitude().max(1.0);
    if !(denominator.magnitude() > MIN_DENOMINATOR_MAGNITUDE * scale) {
        return Err(ImpedanceError::DegenerateDenominator(denominator.magnitude()));
    }

    finite(numerator / denominator - ground_impedance)
}

/// Real part of the impedance, in Ω
pub fn compute_active_resistance(data: &ImpedanceMeasurement) -> f64 {
    data.impedance.re
}

/// Series capacitance in F for a capacitive reading, 0 otherwise
pub fn compute_capacitance(data: &ImpedanceMeasurement) -> f64 {
    if data.impedance.im < 0.0 {
        -1.0 / (2.0 * PI * data.frequency_hz * data.impedance.im)
    } else {
        0.0
    }
}

/// Series inductance in H for an inductive reading, 0 otherwise
pub fn compute_inductance(data: &ImpedanceMeasurement) -> f64 {
    if data.impedance.im > 0.0 {
        data.impedance.im / (2.0 * PI * data.frequency_hz)
    } else {
        0.0
    }
}
