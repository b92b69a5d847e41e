//! Signal level helpers: RMS, peak and dBFS conversions

/// RMS of a full-scale sine, the 0 dBFS reference
pub const DEFAULT_REF_LEVEL: f64 = 0.7071;

/// Offset keeping `log10` finite for silent input
const LEVEL_ZERO_OFFSET: f64 = 1.5849e-13;

/// Root mean square of a signal (0 for an empty slice)
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let square_sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (square_sum / samples.len() as f64).sqrt()
}

/// Maximum sample value (0 for an empty slice)
pub fn peak(samples: &[f32]) -> f64 {
    samples
        .iter()
        .copied()
        .reduce(f32::max)
        .map_or(0.0, |max| max as f64)
}

/// RMS value expressed in dBFS
///
/// # Arguments
/// * `rms_value` - Linear RMS value
/// * `ref_level` - RMS that maps to 0 dBFS
pub fn level(rms_value: f64, ref_level: f64) -> f64 {
    20.0 * (rms_value / ref_level + LEVEL_ZERO_OFFSET).log10()
}

/// Inverse of [`level`]
pub fn inverse_level(level_value: f64, ref_level: f64) -> f64 {
    10f64.powf(level_value / 20.0) * ref_level - LEVEL_ZERO_OFFSET
}
