//! In-place radix-2 FFT
//!
//! Iterative Cooley-Tukey with bit-reversal permutation. Twiddle factors are
//! advanced with the half-angle recurrence instead of calling sin/cos per
//! stage, which accumulates a little rounding error over many stages.

use crate::complex::ComplexNumber;

/// Forward transform, in place
///
/// # Arguments
/// * `samples` - Buffer whose length is a power of two
///
/// # Returns
/// The same buffer, now holding the spectrum X[k]
///
/// # Panics
/// If `samples.len()` is not a power of two
pub fn forward_transform(samples: &mut [ComplexNumber]) -> &mut [ComplexNumber] {
    transform(samples, true)
}

/// Inverse transform, in place, scaled by 1/N
///
/// # Panics
/// If `samples.len()` is not a power of two
pub fn inverse_transform(samples: &mut [ComplexNumber]) -> &mut [ComplexNumber] {
    transform(samples, false)
}

fn transform(samples: &mut [ComplexNumber], is_forward: bool) -> &mut [ComplexNumber] {
    let count = samples.len();
    assert!(
        count.is_power_of_two(),
        "FFT length must be a power of two (got {})",
        count
    );

    let power = count.trailing_zeros();

    bit_reverse(samples);

    // r starts at angle π and is halved every stage
    let mut r = ComplexNumber::new(-1.0, 0.0);
    let mut l2 = 1usize;

    for _ in 0..power {
        let l1 = l2;
        l2 <<= 1;

        let mut r2 = ComplexNumber::new(1.0, 0.0);

        for n in 0..l1 {
            let mut i = n;
            while i < count {
                let i1 = i + l1;
                let temp = r2 * samples[i1];
                samples[i1] = samples[i] - temp;
                samples[i] += temp;
                i += l2;
            }

            r2 *= r;
        }

        let half_sin = (0.5 * (1.0 - r.re)).sqrt();
        r.im = if is_forward { -half_sin } else { half_sin };
        r.re = (0.5 * (1.0 + r.re)).sqrt();
    }

    if !is_forward {
        let scale = 1.0 / count as f64;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }

    samples
}

fn bit_reverse(samples: &mut [ComplexNumber]) {
    let count = samples.len();
    if count < 2 {
        return;
    }

    let half_count = count >> 1;
    let mut j = 0usize;

    for i in 0..count - 1 {
        if i < j {
            samples.swap(i, j);
        }

        let mut k = half_count;
        while k <= j {
            j -= k;
            k >>= 1;
        }

        j += k;
    }
}
