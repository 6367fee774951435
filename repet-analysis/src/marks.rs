//! Pitch-mark detection for pitch-synchronous processing.
//!
//! A lightweight period tracker: walk the signal, estimate the local period
//! from the autocorrelation peak of a short segment, drop a mark and jump
//! ahead by that period. Deterministic and cheap; it does not try to decide
//! whether a region is voiced.

use crate::correlation::{argmax, Autocorrelator};
use crate::error::AnalysisError;

/// Autocorrelation based pitch-mark tracker
#[derive(Debug, Clone, Copy)]
pub struct PitchMarkDetector {
    sample_rate: u32,
    min_freq: f32,
    max_freq: f32,
}

impl PitchMarkDetector {
    /// Create a detector searching periods between `sample_rate / max_freq`
    /// and `sample_rate / min_freq`
    pub fn new(sample_rate: u32, min_freq: f32, max_freq: f32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate);
        }
        if !(min_freq > 0.0 && max_freq > min_freq && max_freq.is_finite()) {
            return Err(AnalysisError::InvalidFrequencyRange {
                min_hz: min_freq,
                max_hz: max_freq,
            });
        }
        Ok(Self {
            sample_rate,
            min_freq,
            max_freq,
        })
    }

    /// Longest period searched, in samples
    pub fn max_period(&self) -> usize {
        (self.sample_rate as f32 / self.min_freq) as usize
    }

    /// Shortest period searched, in samples
    pub fn min_period(&self) -> usize {
        (self.sample_rate as f32 / self.max_freq) as usize
    }

    /// Scan `samples` and return strictly increasing mark positions
    pub fn find_marks(&self, samples: &[f32]) -> Vec<usize> {
        let max_period = self.max_period();
        let min_period = self.min_period();
        let fallback_period = ((min_period + max_period) / 2).max(1);

        let mut marks = Vec::new();
        let mut autocorrelator = Autocorrelator::new();
        let mut pos = 0;

        while pos + max_period < samples.len() {
            let segment_len = (2 * max_period).min(samples.len() - pos);
            let segment = &samples[pos..pos + segment_len];

            let autocorr = autocorrelator.compute(segment);
            let search_end = max_period.min(autocorr.len());
            let period = if min_period < search_end {
                argmax(&autocorr[min_period..search_end])
                    .map(|peak| min_period + peak)
                    .unwrap_or(fallback_period)
            } else {
                fallback_period
            };

            marks.push(pos);
            pos += period.max(1);
        }

        tracing::debug!(
            marks = marks.len(),
            min_period,
            max_period,
            "pitch marks found"
        );
        marks
    }
}

/// Convenience wrapper: marks for `samples` with periods between
/// `sample_rate / fmax` and `sample_rate / fmin`
pub fn find_marks(
    samples: &[f32],
    sample_rate: u32,
    fmin: f32,
    fmax: f32,
) -> Result<Vec<usize>, AnalysisError> {
    Ok(PitchMarkDetector::new(sample_rate, fmin, fmax)?.find_marks(samples))
}

/// Median spacing between consecutive marks; an even count averages the two
/// middle spacings and truncates
pub fn median_period(marks: &[usize]) -> Option<usize> {
    if marks.len() < 2 {
        return None;
    }
    let mut diffs: Vec<usize> = marks.windows(2).map(|w| w[1] - w[0]).collect();
    diffs.sort_unstable();
    let mid = diffs.len() / 2;
    if diffs.len() % 2 == 0 {
        Some((diffs[mid - 1] + diffs[mid]) / 2)
    } else {
        Some(diffs[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_marks_follow_period() {
        let sr = 22050;
        let detector = PitchMarkDetector::new(sr, 80.0, 500.0).unwrap();
        let marks = detector.find_marks(&sine(220.0, sr, sr as usize));

        assert!(marks.len() > 100);
        let expected = sr as f32 / 220.0;
        for pair in marks.windows(2) {
            let spacing = (pair[1] - pair[0]) as f32;
            assert!((spacing - expected).abs() <= 1.5, "spacing {}", spacing);
        }
    }

    #[test]
    fn test_marks_are_monotonic_and_bounded() {
        let sr = 16000;
        let mut signal = sine(150.0, sr, 8000);
        signal.extend(sine(310.0, sr, 8000));
        let marks = find_marks(&signal, sr, 80.0, 500.0).unwrap();

        assert!(marks.windows(2).all(|w| w[0] < w[1]));
        assert!(marks.iter().all(|&m| m < signal.len()));
    }

    #[test]
    fn test_short_signal_has_no_marks() {
        let detector = PitchMarkDetector::new(22050, 80.0, 500.0).unwrap();
        assert!(detector.find_marks(&vec![0.1; 200]).is_empty());
        assert!(detector.find_marks(&[]).is_empty());
    }

    #[test]
    fn test_invalid_range() {
        assert!(PitchMarkDetector::new(22050, 500.0, 80.0).is_err());
        assert!(PitchMarkDetector::new(22050, 0.0, 80.0).is_err());
        assert!(PitchMarkDetector::new(0, 80.0, 500.0).is_err());
    }

    #[test]
    fn test_median_period() {
        assert_eq!(median_period(&[0, 100, 201, 300]), Some(100));
        assert_eq!(median_period(&[0, 10, 30]), Some(15));
        assert_eq!(median_period(&[5]), None);
    }
}
