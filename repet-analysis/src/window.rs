//! Analysis windows

use std::f32::consts::PI;

/// Periodic Hann window of length `n`.
///
/// The periodic form (denominator `n`, not `n - 1`) sums to a constant under
/// overlap-add at hops of `n / 4` and `n / 2`.
pub fn hann(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
            .collect(),
    }
}

/// Multiply `samples` by a Hann window of their own length
pub fn apply_hann(samples: &mut [f32]) {
    let window = hann(samples.len());
    for (s, w) in samples.iter_mut().zip(window) {
        *s *= w;
    }
}
