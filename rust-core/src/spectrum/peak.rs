//! Narrowband phasor estimation
//!
//! Returns the single FFT bin nearest a known tone, giving its magnitude and
//! phase. Accurate only when `frequency` and `sample_rate` match the capture.

use super::fft::forward_transform;
use crate::complex::{real_to_complex, ComplexNumber};

/// Fixed transform size used for peak extraction
pub const PEAK_FFT_SIZE: usize = 1024;

/// Bin index nearest `frequency` for a [`PEAK_FFT_SIZE`]-point transform
pub fn peak_bin(frequency: f64, sample_rate: f64) -> usize {
    let bin = (frequency / sample_rate * PEAK_FFT_SIZE as f64).round();
    if bin.is_finite() && bin > 0.0 {
        (bin as usize).min(PEAK_FFT_SIZE - 1)
    } else {
        0
    }
}

/// Complex value of the spectrum at the bin nearest `frequency`
///
/// # Arguments
/// * `samples` - Real signal (zero-padded or truncated to [`PEAK_FFT_SIZE`])
/// * `frequency` - Tone frequency in Hz
/// * `sample_rate` - Capture rate in Hz
pub fn complex_peak(samples: &[f32], frequency: f64, sample_rate: f64) -> ComplexNumber {
    let mut buffer = real_to_complex(samples, PEAK_FFT_SIZE);
    forward_transform(&mut buffer);
    buffer[peak_bin(frequency, sample_rate)]
}
