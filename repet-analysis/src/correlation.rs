//! Autocorrelation and cross-correlation helpers.
//!
//! Autocorrelation goes through the FFT (Wiener-Khinchin): the signal is
//! zero-padded to at least `2n - 1` points so the circular result equals the
//! linear one, then `|X|^2` is transformed back.

use rustfft::{num_complex::Complex, FftPlanner};

/// Reusable autocorrelation engine (keeps planned FFTs across calls)
pub struct Autocorrelator {
    planner: FftPlanner<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Default for Autocorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl Autocorrelator {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::new(),
        }
    }

    /// Non-negative lag half of the full linear autocorrelation.
    ///
    /// `result[lag] = sum_j x[j] * x[j + lag]` for `lag` in `0..x.len()`.
    pub fn compute(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let size = (2 * n - 1).next_power_of_two();
        let forward = self.planner.plan_fft_forward(size);
        let inverse = self.planner.plan_fft_inverse(size);

        self.buffer.clear();
        self.buffer
            .extend(samples.iter().map(|&s| Complex::new(s, 0.0)));
        self.buffer.resize(size, Complex::new(0.0, 0.0));

        forward.process(&mut self.buffer);
        for c in self.buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        inverse.process(&mut self.buffer);

        let norm = 1.0 / size as f32;
        self.buffer[..n].iter().map(|c| c.re * norm).collect()
    }
}

/// One-shot autocorrelation (see [`Autocorrelator::compute`])
pub fn autocorrelation(samples: &[f32]) -> Vec<f32> {
    Autocorrelator::new().compute(samples)
}

/// Inner product of two equally long slices, accumulated in f64
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

/// Index of the largest value (first one wins on ties)
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_autocorrelation(x: &[f32]) -> Vec<f32> {
        (0..x.len())
            .map(|lag| (0..x.len() - lag).map(|j| x[j] * x[j + lag]).sum())
            .collect()
    }

    #[test]
    fn test_matches_direct_sum() {
        let x: Vec<f32> = (0..37).map(|i| ((i * 7 % 11) as f32 - 5.0) / 5.0).collect();
        let fast = autocorrelation(&x);
        let slow = direct_autocorrelation(&x);
        assert_eq!(fast.len(), x.len());
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_lag_zero_is_energy() {
        let x = [1.0, -2.0, 3.0];
        let r = autocorrelation(&x);
        assert!((r[0] - 14.0).abs() < 1e-4);
        assert!((r[2] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_reuse_across_lengths() {
        let mut engine = Autocorrelator::new();
        assert_eq!(engine.compute(&[1.0; 10]).len(), 10);
        assert_eq!(engine.compute(&[1.0; 3]).len(), 3);
        assert!(engine.compute(&[]).is_empty());
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.0, 3.0, 1.0, 3.0]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.0, 0.0]), Some(0));
    }
}
