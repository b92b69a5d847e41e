//! Complex arithmetic primitive
//!
//! `ComplexNumber` is `num_complex::Complex<f64>`; this module adds the
//! polar helpers and NaN checks the measurement pipeline relies on.

use num_complex::Complex;

/// Complex value used throughout the pipeline (`re + j·im`)
pub type ComplexNumber = Complex<f64>;

/// Polar and validity helpers for [`ComplexNumber`]
pub trait ComplexExt: Sized {
    /// Build from polar form
    ///
    /// # Arguments
    /// * `angle` - Angle in radians
    /// * `magnitude` - Magnitude (modulus)
    fn from_angle(angle: f64, magnitude: f64) -> Self;

    /// `sqrt(re² + im²)`
    fn magnitude(&self) -> f64;

    /// `atan2(im, re)` in radians, range (-π, π]
    fn angle(&self) -> f64;

    /// Angle in degrees
    fn angle_degrees(&self) -> f64 {
        self.angle().to_degrees()
    }

    /// Keep the real part only
    fn as_real(&self) -> Self;

    /// Keep the imaginary part only
    fn as_imag(&self) -> Self;

    /// True if either magnitude or angle is NaN
    fn is_nan_value(&self) -> bool {
        self.magnitude().is_nan() || self.angle().is_nan()
    }

    /// True if both parts are finite numbers
    fn is_finite_value(&self) -> bool;
}

impl ComplexExt for ComplexNumber {
    fn from_angle(angle: f64, magnitude: f64) -> Self {
        Complex::from_polar(magnitude, angle)
    }

    fn magnitude(&self) -> f64 {
        self.norm()
    }

    fn angle(&self) -> f64 {
        self.im.atan2(self.re)
    }

    fn as_real(&self) -> Self {
        Complex::new(self.re, 0.0)
    }

    fn as_imag(&self) -> Self {
        Complex::new(0.0, self.im)
    }

    fn is_finite_value(&self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

/// Copy a real-valued signal into a complex buffer of `len` elements
///
/// Samples beyond `len` are truncated, missing ones are zero-padded.
pub fn real_to_complex(samples: &[f32], len: usize) -> Vec<ComplexNumber> {
    let mut buffer = vec![ComplexNumber::new(0.0, 0.0); len];
    for (slot, &sample) in buffer.iter_mut().zip(samples) {
        slot.re = sample as f64;
    }
    buffer
}
