//! TD-PSOLA (Time-Domain Pitch-Synchronous Overlap-Add).
//!
//! Grains two periods long, with an extra period of context on each side,
//! are cut around the interior pitch marks, windowed and resampled by the
//! shift factor. They are then laid down on a new mark grid whose spacing is
//! the local period divided by the factor. The grid covers the same span of
//! time as the analysis marks, so duration and note timing stay put while the
//! repetition rate (the perceived pitch) changes.

use super::vocoder::PhaseVocoder;
use super::{is_identity, validate_factor, OUTPUT_PEAK};
use crate::error::DspError;
use crate::resample::{resample_to_length, Interpolation};
use repet_analysis::{hann, median_period, normalize_peak, PitchMarkDetector};
use tracing::{debug, warn};

/// Lowest fundamental tracked by the mark detector
pub const MIN_FREQ: f32 = 80.0;
/// Highest fundamental tracked by the mark detector
pub const MAX_FREQ: f32 = 500.0;
/// Fewer marks than this hands the signal to the phase vocoder
pub const MIN_MARKS: usize = 4;
/// Resampled grains must be longer than this
const MIN_GRAIN_LEN: usize = 8;
/// Floor for the overlap weight before normalisation
const WEIGHT_FLOOR: f32 = 1e-8;

/// What TD-PSOLA actually did
#[derive(Debug, Clone, PartialEq)]
pub enum PsolaOutcome {
    /// Pitch-synchronous resynthesis succeeded
    Shifted(Vec<f32>),
    /// Too few pitch marks; the phase vocoder produced the result instead
    FellBackToPhaseVocoder { samples: Vec<f32>, reason: DspError },
}

impl PsolaOutcome {
    pub fn samples(&self) -> &[f32] {
        match self {
            PsolaOutcome::Shifted(samples) => samples,
            PsolaOutcome::FellBackToPhaseVocoder { samples, .. } => samples,
        }
    }

    pub fn into_samples(self) -> Vec<f32> {
        match self {
            PsolaOutcome::Shifted(samples) => samples,
            PsolaOutcome::FellBackToPhaseVocoder { samples, .. } => samples,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PsolaOutcome::FellBackToPhaseVocoder { .. })
    }
}

/// TD-PSOLA pitch shifter
pub struct TdPsola {
    detector: PitchMarkDetector,
    fallback: PhaseVocoder,
}

impl TdPsola {
    pub fn new(sample_rate: u32) -> Result<Self, DspError> {
        Ok(Self {
            detector: PitchMarkDetector::new(sample_rate, MIN_FREQ, MAX_FREQ)?,
            fallback: PhaseVocoder::new()?,
        })
    }

    /// Shift pitch by `factor` (new / old frequency) keeping the length
    pub fn shift(&self, samples: &[f32], factor: f32) -> Result<PsolaOutcome, DspError> {
        validate_factor(factor)?;
        if is_identity(factor) {
            return Ok(PsolaOutcome::Shifted(samples.to_vec()));
        }

        let marks = self.detector.find_marks(samples);
        let period = match median_period(&marks) {
            Some(period) if marks.len() >= MIN_MARKS => period.max(1),
            _ => {
                let reason = DspError::InsufficientData(format!(
                    "{} pitch marks found, need at least {}",
                    marks.len(),
                    MIN_MARKS
                ));
                warn!(%reason, "TD-PSOLA falling back to phase vocoder");
                let samples = self.fallback.shift(samples, factor)?;
                return Ok(PsolaOutcome::FellBackToPhaseVocoder { samples, reason });
            }
        };

        let grain_len = 2 * period;
        let overlap = period;

        // The first mark and the last two lack context on one side
        let interior_end = marks.len() - 2;
        let grains: Vec<Option<Vec<f32>>> = (1..interior_end)
            .map(|i| extract_grain(samples, marks[i], grain_len, overlap, factor))
            .collect();

        let mut output = vec![0.0f32; samples.len()];
        let mut weights = vec![0.0f32; samples.len()];
        let mut placed = 0usize;

        let last = marks[interior_end - 1] as f64;
        let mut position = marks[1] as f64;
        let mut nearest = 1;

        while position <= last {
            while nearest + 1 < interior_end
                && (marks[nearest + 1] as f64 - position).abs()
                    < (marks[nearest] as f64 - position).abs()
            {
                nearest += 1;
            }

            if let Some(grain) = &grains[nearest - 1] {
                overlap_add(&mut output, &mut weights, grain, position.round() as usize);
                placed += 1;
            }

            let local_period = (marks[nearest + 1] - marks[nearest - 1]) as f64 / 2.0;
            position += (local_period / factor as f64).max(1.0);
        }

        for (sample, &weight) in output.iter_mut().zip(&weights) {
            *sample /= weight.max(WEIGHT_FLOOR);
        }
        normalize_peak(&mut output, OUTPUT_PEAK);

        debug!(
            marks = marks.len(),
            period,
            grains = placed,
            factor,
            "TD-PSOLA shift"
        );
        Ok(PsolaOutcome::Shifted(output))
    }
}

/// Hann-windowed extract around `mark`, resampled to change its pitch.
///
/// `None` when the clipped extract is shorter than half a grain or the
/// resampled grain is too short to carry a waveform.
fn extract_grain(
    samples: &[f32],
    mark: usize,
    grain_len: usize,
    overlap: usize,
    factor: f32,
) -> Option<Vec<f32>> {
    let reach = grain_len / 2 + overlap;
    let start = mark.saturating_sub(reach);
    let end = (mark + reach).min(samples.len());
    let len = end - start;
    if len < grain_len / 2 {
        return None;
    }

    let window = hann(len);
    let windowed: Vec<f32> = samples[start..end]
        .iter()
        .zip(&window)
        .map(|(&s, &w)| s * w)
        .collect();

    let new_len = (len as f64 / factor as f64) as usize;
    if new_len <= MIN_GRAIN_LEN {
        return None;
    }
    Some(resample_to_length(&windowed, new_len, Interpolation::Linear))
}

/// Blend `grain` into `output` centred on `center`, tracking the blend weights
fn overlap_add(output: &mut [f32], weights: &mut [f32], grain: &[f32], center: usize) {
    let blend = hann(grain.len());
    let start = center as isize - (grain.len() / 2) as isize;

    for (j, (&g, &w)) in grain.iter().zip(&blend).enumerate() {
        let index = start + j as isize;
        if index < 0 {
            continue;
        }
        let index = index as usize;
        if index >= output.len() {
            break;
        }
        output[index] += g * w;
        weights[index] += w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repet_analysis::{synth, PitchEstimator, YinEstimator};

    #[test]
    fn test_identity() {
        let psola = TdPsola::new(22050).unwrap();
        let input = synth::sine(220.0, 0.5, 22050, 5000);
        assert_eq!(psola.shift(&input, 1.0).unwrap(), PsolaOutcome::Shifted(input.clone()));
        assert_eq!(psola.shift(&input, 1.0005).unwrap().into_samples(), input);
    }

    #[test]
    fn test_keeps_length() {
        let psola = TdPsola::new(22050).unwrap();
        let input = synth::sine(180.0, 0.5, 22050, 22050);
        for factor in [0.7, 1.25, 1.9] {
            let outcome = psola.shift(&input, factor).unwrap();
            assert!(!outcome.is_fallback());
            assert_eq!(outcome.samples().len(), input.len());
            assert!(outcome.samples().iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_raises_pitch() {
        let sr = 22050;
        let psola = TdPsola::new(sr).unwrap();
        let input = synth::sine(220.0, 0.5, sr, sr as usize);
        let factor = 2.0f32.powf(5.0 / 12.0);
        let output = psola.shift(&input, factor).unwrap().into_samples();

        let third = output.len() / 3;
        let pitch = YinEstimator::new()
            .estimate(&output[third..2 * third], sr)
            .unwrap();
        let expected = 220.0 * factor;
        assert!((pitch - expected).abs() / expected < 0.02, "got {}", pitch);
    }

    #[test]
    fn test_short_input_falls_back() {
        let psola = TdPsola::new(22050).unwrap();
        // Too short for four marks of an 80 Hz search window
        let input = synth::sine(220.0, 0.5, 22050, 400);
        let outcome = psola.shift(&input, 1.5).unwrap();
        assert!(outcome.is_fallback());
        assert_eq!(outcome.samples().len(), 400);
        match outcome {
            PsolaOutcome::FellBackToPhaseVocoder { reason, .. } => {
                assert!(matches!(reason, DspError::InsufficientData(_)));
            }
            PsolaOutcome::Shifted(_) => unreachable!(),
        }
    }

    #[test]
    fn test_silence_produces_no_nan() {
        let psola = TdPsola::new(22050).unwrap();
        let outcome = psola.shift(&vec![0.0; 22050], 1.5).unwrap();
        assert!(outcome.samples().iter().all(|s| s.is_finite() && *s == 0.0));
    }

    #[test]
    fn test_overlap_add_clips_at_edges() {
        let mut output = vec![0.0; 10];
        let mut weights = vec![0.0; 10];
        overlap_add(&mut output, &mut weights, &[1.0; 8], 1);
        overlap_add(&mut output, &mut weights, &[1.0; 8], 9);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!(weights[0] > 0.0);
        assert!(weights[9] > 0.0);
    }
}
