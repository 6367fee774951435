//! Mono sample buffers tagged with their sample rate

/// A finite mono recording
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Signal {
    /// Wrap a buffer of samples recorded at `sample_rate` Hz
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A zero-valued signal of `len` samples
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0.0 when the sample rate is unset)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Absolute peak level
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// Sum of squared samples
    pub fn energy(&self) -> f64 {
        self.samples.iter().map(|&s| s as f64 * s as f64).sum()
    }

    /// Same sample rate, new samples
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self::new(samples, self.sample_rate)
    }
}

/// Absolute peak of a buffer
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Scale a buffer so its absolute peak equals `target`.
///
/// Silent buffers are left untouched.
pub fn normalize_peak(samples: &mut [f32], target: f32) {
    let max = peak(samples);
    if max > 0.0 {
        let gain = target / max;
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}
