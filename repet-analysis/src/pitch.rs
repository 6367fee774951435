//! Fundamental-frequency estimation using the YIN algorithm
//!
//! Used to find the current pitch of a recording before shifting it to an
//! absolute target. The estimator works frame by frame and reports the
//! median of the voiced frames.
//!
//! ## Algorithm
//!
//! YIN (de Cheveigné & Kawahara, 2002):
//!
//! 1. **Difference function** - d(τ) = Σ(x[j] - x[j+τ])²
//! 2. **Cumulative mean normalized difference** - d'(τ)
//! 3. **Absolute threshold** - first τ where d'(τ) < threshold
//! 4. **Parabolic interpolation** - sub-sample accuracy

/// Lowest note considered by default (C2)
pub const DEFAULT_MIN_FREQ: f32 = 65.4;
/// Highest note considered by default (C7)
pub const DEFAULT_MAX_FREQ: f32 = 2093.0;
/// Pitch assumed when a recording has no voiced frame
pub const FALLBACK_PITCH_HZ: f32 = 200.0;

/// Anything that can name the fundamental of a whole recording
pub trait PitchEstimator {
    /// Representative fundamental in Hz, or `None` when nothing is voiced
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Option<f32>;
}

/// Result of pitch detection for a single frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PitchFrame {
    /// Detected frequency in Hz (0.0 if unvoiced/uncertain)
    pub frequency: f32,
    /// Confidence/clarity of detection (0.0 - 1.0)
    pub confidence: f32,
}

impl PitchFrame {
    /// Check if a pitch was confidently detected
    pub fn is_voiced(&self) -> bool {
        self.frequency > 0.0 && self.confidence > 0.0
    }
}

/// YIN pitch estimator
#[derive(Debug, Clone, Copy)]
pub struct YinEstimator {
    min_freq: f32,
    max_freq: f32,
    threshold: f32,
    hop_size: usize,
    /// RMS below which a frame counts as silent
    silence_rms: f32,
}

impl Default for YinEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl YinEstimator {
    pub fn new() -> Self {
        Self::with_range(DEFAULT_MIN_FREQ, DEFAULT_MAX_FREQ)
    }

    /// Create with a custom frequency range
    pub fn with_range(min_freq: f32, max_freq: f32) -> Self {
        Self {
            min_freq,
            max_freq,
            threshold: 0.1,
            hop_size: 512,
            silence_rms: 1e-4,
        }
    }

    /// Set YIN threshold (0.01 - 0.5). Lower is stricter.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.clamp(0.01, 0.5);
        self
    }

    /// Samples between analysis frames
    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = hop_size.max(1);
        self
    }

    fn period_range(&self, sample_rate: u32) -> (usize, usize) {
        let min_period = ((sample_rate as f32 / self.max_freq) as usize).max(2);
        let max_period = (sample_rate as f32 / self.min_freq) as usize;
        (min_period, max_period)
    }

    /// Samples needed per analysis frame
    pub fn frame_size(&self, sample_rate: u32) -> usize {
        self.period_range(sample_rate).1 * 2
    }

    /// Detect pitch in a single frame (at least `frame_size` samples)
    pub fn detect(&self, frame: &[f32], sample_rate: u32) -> PitchFrame {
        let (min_period, max_period) = self.period_range(sample_rate);
        let max_period = max_period.min(frame.len() / 2);
        if max_period <= min_period + 1 {
            return PitchFrame::default();
        }

        let rms = (frame.iter().map(|&s| s as f64 * s as f64).sum::<f64>() / frame.len() as f64)
            .sqrt() as f32;
        if rms < self.silence_rms {
            return PitchFrame::default();
        }

        let cmnd = cumulative_mean_normalized_difference(frame, max_period);
        let (tau, aperiodicity) = match self.best_period(&cmnd, min_period, max_period) {
            Some(found) => found,
            None => return PitchFrame::default(),
        };

        let refined = parabolic_interpolation(&cmnd, tau);
        PitchFrame {
            frequency: sample_rate as f32 / refined,
            confidence: (1.0 - aperiodicity).clamp(0.0, 1.0),
        }
    }

    /// Pitch track over a whole buffer, one frame per hop
    pub fn track(&self, samples: &[f32], sample_rate: u32) -> Vec<PitchFrame> {
        let frame_size = self.frame_size(sample_rate);
        if frame_size == 0 || samples.len() < frame_size {
            return Vec::new();
        }

        let num_frames = (samples.len() - frame_size) / self.hop_size + 1;
        (0..num_frames)
            .map(|i| {
                let start = i * self.hop_size;
                self.detect(&samples[start..start + frame_size], sample_rate)
            })
            .collect()
    }

    /// First dip below the threshold (walked down to its local minimum),
    /// else the global minimum if it is still reasonably periodic
    fn best_period(&self, cmnd: &[f32], min_period: usize, max_period: usize) -> Option<(usize, f32)> {
        let mut tau = min_period;
        while tau < max_period {
            if cmnd[tau] < self.threshold {
                while tau + 1 < max_period && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                return Some((tau, cmnd[tau]));
            }
            tau += 1;
        }

        let (best_tau, best_val) = (min_period..max_period)
            .map(|t| (t, cmnd[t]))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        (best_val < 0.5).then_some((best_tau, best_val))
    }
}

impl PitchEstimator for YinEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        let mut voiced: Vec<f32> = self
            .track(samples, sample_rate)
            .into_iter()
            .filter(PitchFrame::is_voiced)
            .map(|frame| frame.frequency)
            .collect();

        if voiced.is_empty() {
            tracing::debug!("no voiced frames found");
            return None;
        }

        voiced.sort_by(f32::total_cmp);
        let mid = voiced.len() / 2;
        let median = if voiced.len() % 2 == 0 {
            (voiced[mid - 1] + voiced[mid]) / 2.0
        } else {
            voiced[mid]
        };
        tracing::debug!(frames = voiced.len(), median, "estimated pitch");
        Some(median)
    }
}

/// YIN steps 1-3 over lags `0..=max_period`
fn cumulative_mean_normalized_difference(frame: &[f32], max_period: usize) -> Vec<f32> {
    let window = frame.len() - max_period;
    let mut cmnd = vec![1.0f32; max_period + 1];

    let mut running_sum = 0.0f64;
    for tau in 1..=max_period {
        let diff: f64 = (0..window)
            .map(|j| {
                let d = frame[j] as f64 - frame[j + tau] as f64;
                d * d
            })
            .sum();
        running_sum += diff;
        cmnd[tau] = if running_sum > 1e-12 {
            (diff * tau as f64 / running_sum) as f32
        } else {
            1.0
        };
    }
    cmnd
}

/// Fit a parabola through the dip and its neighbours
fn parabolic_interpolation(cmnd: &[f32], tau: usize) -> f32 {
    if tau < 1 || tau + 1 >= cmnd.len() {
        return tau as f32;
    }
    let (s0, s1, s2) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
    let denom = s0 - 2.0 * s1 + s2;
    if denom.abs() < 1e-12 {
        return tau as f32;
    }
    tau as f32 + 0.5 * (s0 - s2) / denom
}
