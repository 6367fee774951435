//! REPET - REpeating Pattern Extraction Technique
//!
//! Splits a mono mixture into a repeating background (typically the
//! accompaniment) and a non-repeating foreground (typically the vocal).
//!
//! # Algorithm
//!
//! 1. STFT of the mixture
//! 2. Beat spectrum: mean autocorrelation of the low bins over time
//! 3. Repetition period: beat-spectrum peak between 1 and 10 seconds
//! 4. Repeating model: median across period-long segments, tiled
//! 5. Soft mask `min(model / mixture, 1)` and its complement
//! 6. Each masked spectrogram is inverted back to the input length
//!
//! # Usage
//!
//! ```rust,ignore
//! use repet_dsp::{RepetConfig, RepetSeparator};
//!
//! let separator = RepetSeparator::new(RepetConfig::default())?;
//! let separation = separator.separate(&signal)?;
//! println!("period: {:.2} s", separation.period_secs);
//! ```

mod mask;
mod period;

pub use mask::{median_filter_rows, repeating_spectrogram, Mask, MASK_EPSILON};
pub use period::{
    beat_spectrum, find_repeating_period, BEAT_SPECTRUM_BINS, MAX_PERIOD_SECS, MIN_PERIOD_SECS,
};

use crate::error::DspError;
use repet_analysis::{Grid, Signal, Spectrogram, Stft};
use tracing::{debug, info};

/// STFT geometry for the separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepetConfig {
    pub fft_size: usize,
    pub hop_length: usize,
}

impl Default for RepetConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            hop_length: 512,
        }
    }
}

/// Result of a separation
#[derive(Debug, Clone)]
pub struct Separation {
    /// Non-repeating part (vocal)
    pub foreground: Signal,
    /// Repeating part (instrumental)
    pub background: Signal,
    /// Detected repetition period in frames
    pub period: usize,
    /// Detected repetition period in seconds
    pub period_secs: f32,
}

/// Repeating-pattern separator
pub struct RepetSeparator {
    config: RepetConfig,
    stft: Stft,
}

impl RepetSeparator {
    /// Create a separator; the FFT size must be even and the hop at most the FFT size
    pub fn new(config: RepetConfig) -> Result<Self, DspError> {
        let stft = Stft::new(config.fft_size, config.hop_length)?;
        Ok(Self { config, stft })
    }

    pub fn config(&self) -> RepetConfig {
        self.config
    }

    /// Split `signal` into foreground and background of the same length
    pub fn separate(&self, signal: &Signal) -> Result<Separation, DspError> {
        let sample_rate = signal.sample_rate();
        if sample_rate == 0 {
            return Err(DspError::InvalidParameter(
                "sample rate must be positive".to_string(),
            ));
        }

        if signal.is_empty() {
            debug!("empty signal, nothing to separate");
            return Ok(Separation {
                foreground: Signal::new(Vec::new(), sample_rate),
                background: Signal::new(Vec::new(), sample_rate),
                period: 1,
                period_secs: self.frames_to_secs(1, sample_rate),
            });
        }

        let spectrogram = self.stft.forward(signal.samples());
        let magnitude = spectrogram.magnitude();
        let phase = spectrogram.phase();

        let period = find_repeating_period(&magnitude, sample_rate, self.config.hop_length);
        let period_secs = self.frames_to_secs(period, sample_rate);
        debug!(period, period_secs, frames = magnitude.frames(), "repeating period");

        let repeating = repeating_spectrogram(&magnitude, period);
        let mask = Mask::from_repeating(&repeating, &magnitude);
        debug!(mean_background = mask.mean_background(), "mask computed");

        let background = self.reconstruct(&magnitude, mask.background(), &phase, signal.len());
        let foreground = self.reconstruct(&magnitude, &mask.foreground(), &phase, signal.len());

        info!(
            samples = signal.len(),
            sample_rate,
            period,
            period_secs,
            "separation complete"
        );

        Ok(Separation {
            foreground: signal.with_samples(foreground),
            background: signal.with_samples(background),
            period,
            period_secs,
        })
    }

    /// Masked magnitude recombined with the mixture phase, inverted to `length`
    fn reconstruct(&self, magnitude: &Grid, mask: &Grid, phase: &Grid, length: usize) -> Vec<f32> {
        let masked = magnitude.zip_map(mask, |m, w| m * w);
        let spectrogram =
            Spectrogram::from_polar(&masked, phase, self.config.fft_size, self.config.hop_length);
        self.stft.inverse(&spectrogram, length)
    }

    fn frames_to_secs(&self, frames: usize, sample_rate: u32) -> f32 {
        frames as f32 * self.config.hop_length as f32 / sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repet_analysis::synth;

    #[test]
    fn test_invalid_config() {
        assert!(RepetSeparator::new(RepetConfig {
            fft_size: 1023,
            hop_length: 256
        })
        .is_err());
        assert!(RepetSeparator::new(RepetConfig {
            fft_size: 1024,
            hop_length: 0
        })
        .is_err());
    }

    #[test]
    fn test_output_length_matches_input() {
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        for len in [1, 511, 2048, 10_001] {
            let signal = Signal::new(synth::sine(330.0, 0.5, 22050, len), 22050);
            let separation = separator.separate(&signal).unwrap();
            assert_eq!(separation.foreground.len(), len);
            assert_eq!(separation.background.len(), len);
            assert_eq!(separation.background.sample_rate(), 22050);
        }
    }

    #[test]
    fn test_empty_signal() {
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let separation = separator.separate(&Signal::new(Vec::new(), 22050)).unwrap();
        assert!(separation.foreground.is_empty());
        assert!(separation.background.is_empty());
        assert_eq!(separation.period, 1);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let result = separator.separate(&Signal::new(vec![0.0; 100], 0));
        assert!(matches!(result, Err(DspError::InvalidParameter(_))));
    }

    #[test]
    fn test_silence_stays_silent() {
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let separation = separator.separate(&Signal::silence(44_100, 22050)).unwrap();

        for signal in [&separation.foreground, &separation.background] {
            assert_eq!(signal.len(), 44_100);
            assert!(signal.samples().iter().all(|s| s.is_finite()));
            assert!(signal.peak() < 1e-6);
        }
        assert!(separation.period >= 1);
    }

    #[test]
    fn test_components_sum_to_mixture() {
        // Complementary masks over a shared phase invert to the mixture
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let mix = synth::test_mixture(3.0, 0.5, 8000);
        let separation = separator.separate(&mix.mixture).unwrap();

        let fg = separation.foreground.samples();
        let bg = separation.background.samples();
        for (i, &x) in mix.mixture.samples().iter().enumerate() {
            assert!((fg[i] + bg[i] - x).abs() < 1e-3, "sample {}", i);
        }
    }

    #[test]
    fn test_detects_tiled_pattern_period() {
        // 16 s at 8 kHz: a 2 s melody spans 31.25 frames of 512
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let notes = [110.0, 165.0, 220.0, 294.0];
        let mut samples = synth::note_sequence(&notes, 2.0, 16.0, 8000);
        for (s, v) in samples.iter_mut().zip(synth::fm_tone(16.0, 8000)) {
            *s += v;
        }
        let separation = separator.separate(&Signal::new(samples, 8000)).unwrap();

        let expected = 2.0 * 8000.0 / 512.0;
        assert!(
            (separation.period as f32 - expected).abs() <= 1.0,
            "period {}",
            separation.period
        );
        assert!((separation.period_secs - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_mixture_scenario() {
        // 8 s at 22050: 2 s is ~86 frames of 512
        let separator = RepetSeparator::new(RepetConfig::default()).unwrap();
        let mix = synth::test_mixture(8.0, 2.0, 22050);
        let separation = separator.separate(&mix.mixture).unwrap();

        assert!((separation.period as f32 - 86.13).abs() <= 1.0);
        assert_eq!(separation.foreground.len(), mix.mixture.len());
        assert_eq!(separation.background.len(), mix.mixture.len());
        assert!(separation.foreground.energy() > 0.0);
        assert!(separation.background.energy() > 0.0);

        // The tiled accompaniment dominates the background estimate
        assert!(separation.background.energy() > separation.foreground.energy());
    }
}
