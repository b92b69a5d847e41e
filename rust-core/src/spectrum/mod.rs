//! Spectral analysis: radix-2 FFT, phasor extraction and signal levels

pub mod fft;
pub mod levels;
pub mod peak;

pub use fft::{forward_transform, inverse_transform};
pub use levels::{level, peak, rms};
pub use peak::{complex_peak, PEAK_FFT_SIZE};
