//! Phase vocoder time-stretching and pitch shifting.
//!
//! Time-stretching walks the analysis frames at a fractional rate,
//! interpolating magnitudes between neighbouring frames and accumulating each
//! bin's phase by its expected advance plus the measured deviation. Pitch
//! shifting stretches by the shift factor and resamples back to the input
//! length.

use super::{is_identity, validate_factor};
use crate::error::DspError;
use crate::resample::{resample_to_length, Interpolation};
use repet_analysis::{Complex, Spectrogram, Stft};
use std::f32::consts::PI;

const TWO_PI: f32 = 2.0 * PI;

pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Offline phase vocoder
pub struct PhaseVocoder {
    stft: Stft,
    /// Expected phase advance per bin over one hop
    omega: Vec<f32>,
}

impl PhaseVocoder {
    /// 2048-point frames with a 512-sample hop
    pub fn new() -> Result<Self, DspError> {
        Self::with_geometry(DEFAULT_FFT_SIZE, DEFAULT_HOP_LENGTH)
    }

    pub fn with_geometry(fft_size: usize, hop_length: usize) -> Result<Self, DspError> {
        let stft = Stft::new(fft_size, hop_length)?;

        // omega[k] = 2 * pi * k * hop_size / fft_size
        let omega = (0..stft.num_bins())
            .map(|k| TWO_PI * k as f32 * hop_length as f32 / fft_size as f32)
            .collect();

        Ok(Self { stft, omega })
    }

    /// Change duration without changing pitch. `rate > 1` speeds up; the
    /// result has `round(len / rate)` samples.
    pub fn time_stretch(&self, samples: &[f32], rate: f32) -> Result<Vec<f32>, DspError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(DspError::InvalidParameter(format!(
                "stretch rate must be positive and finite, got {}",
                rate
            )));
        }
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let length = (samples.len() as f64 / rate as f64).round() as usize;
        let spectrogram = self.stft.forward(samples);
        let stretched = self.stretch_frames(&spectrogram, rate as f64);
        Ok(self.stft.inverse(&stretched, length))
    }

    /// Shift pitch by `factor` (new / old frequency) keeping the length
    pub fn shift(&self, samples: &[f32], factor: f32) -> Result<Vec<f32>, DspError> {
        validate_factor(factor)?;
        if is_identity(factor) || samples.is_empty() {
            return Ok(samples.to_vec());
        }

        let semitones = 12.0 * factor.log2();
        tracing::debug!(factor, semitones, "phase vocoder shift");

        let stretched = self.time_stretch(samples, 1.0 / factor)?;
        Ok(resample_to_length(&stretched, samples.len(), Interpolation::Cubic))
    }

    /// Resample the frame sequence at `rate` frames per output frame
    fn stretch_frames(&self, spectrogram: &Spectrogram, rate: f64) -> Spectrogram {
        let frames = spectrogram.frames();
        let bins = spectrogram.bins();
        let zero = Complex::new(0.0, 0.0);
        let column = |k: usize, t: usize| {
            if t < frames {
                spectrogram.get(k, t)
            } else {
                zero
            }
        };

        let mut phase_accum: Vec<f32> = (0..bins).map(|k| column(k, 0).arg()).collect();
        let mut output = Vec::new();

        let mut step = 0usize;
        loop {
            let position = step as f64 * rate;
            if position >= frames as f64 {
                break;
            }
            let t = position as usize;
            let alpha = (position - t as f64) as f32;

            let mut out_bins = Vec::with_capacity(bins);
            for k in 0..bins {
                let current = column(k, t);
                let next = column(k, t + 1);

                let mag = (1.0 - alpha) * current.norm() + alpha * next.norm();
                out_bins.push(Complex::from_polar(mag, phase_accum[k]));

                let deviation = wrap_phase(next.arg() - current.arg() - self.omega[k]);
                phase_accum[k] = wrap_phase(phase_accum[k] + self.omega[k] + deviation);
            }
            output.push(out_bins);
            step += 1;
        }

        Spectrogram::from_frames(&output, self.stft.fft_size(), self.stft.hop_length())
    }
}

/// Wrap phase to [-π, π]
#[inline(always)]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * (phase / TWO_PI).round()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repet_analysis::{synth, PitchEstimator, YinEstimator};

    #[test]
    fn test_phase_wrap() {
        assert!((wrap_phase(0.0)).abs() < 0.001);
        assert!((wrap_phase(PI + 0.1) - (-PI + 0.1)).abs() < 0.001);
        assert!((wrap_phase(-PI - 0.1) - (PI - 0.1)).abs() < 0.001);
        assert!((wrap_phase(7.0 * TWO_PI + 0.5) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_time_stretch_lengths() {
        let vocoder = PhaseVocoder::new().unwrap();
        let input = synth::sine(220.0, 0.5, 22050, 22050);
        assert_eq!(vocoder.time_stretch(&input, 2.0).unwrap().len(), 11025);
        assert_eq!(vocoder.time_stretch(&input, 0.5).unwrap().len(), 44100);
        assert!(vocoder.time_stretch(&input, 0.0).is_err());
    }

    #[test]
    fn test_time_stretch_keeps_pitch() {
        let sr = 22050;
        let vocoder = PhaseVocoder::new().unwrap();
        let input = synth::sine(220.0, 0.5, sr, sr as usize);
        let stretched = vocoder.time_stretch(&input, 0.75).unwrap();

        let third = stretched.len() / 3;
        let pitch = YinEstimator::new()
            .estimate(&stretched[third..2 * third], sr)
            .unwrap();
        assert!((pitch - 220.0).abs() / 220.0 < 0.02, "got {}", pitch);
    }

    #[test]
    fn test_shift_keeps_length() {
        let vocoder = PhaseVocoder::new().unwrap();
        let input = synth::sine(220.0, 0.5, 22050, 12_345);
        for factor in [0.5, 0.8, 1.5, 2.0] {
            assert_eq!(vocoder.shift(&input, factor).unwrap().len(), 12_345);
        }
    }

    #[test]
    fn test_shift_identity_and_invalid() {
        let vocoder = PhaseVocoder::new().unwrap();
        let input = synth::sine(220.0, 0.5, 22050, 4096);
        assert_eq!(vocoder.shift(&input, 1.0).unwrap(), input);
        assert!(vocoder.shift(&input, -2.0).is_err());
        assert!(vocoder.shift(&input, f32::NAN).is_err());
    }
}
