//! Duration-preserving pitch shifting.
//!
//! Three engines share one contract: a mono buffer and a factor (new / old
//! frequency) in, a buffer of the same length out.
//!
//! - **TD-PSOLA**: pitch-synchronous grains, best on clean monophonic voice
//! - **Phase vocoder**: spectral time-stretch plus resampling, works on anything
//! - **WSOLA**: resampling plus similarity-aligned overlap-add
//!
//! [`PitchShifter`] picks the engine and converts semitones or an absolute
//! target pitch into a factor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use repet_dsp::{PitchShifter, ShiftAmount, ShiftMethod};
//!
//! let shifter = PitchShifter::new(22050)?;
//! let up_a_fourth = shifter.shift(&samples, ShiftAmount::Semitones(5.0), ShiftMethod::Wsola)?;
//! ```

mod psola;
mod vocoder;
mod wsola;

pub use psola::{PsolaOutcome, TdPsola};
pub use vocoder::PhaseVocoder;
pub use wsola::Wsola;

use crate::error::DspError;
use repet_analysis::{PitchEstimator, YinEstimator, FALLBACK_PITCH_HZ};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Peak level of every engine's output
pub const OUTPUT_PEAK: f32 = 0.9;
/// Semitone shifts smaller than this return the input untouched
pub const SEMITONE_TOLERANCE: f32 = 0.01;
/// Factors this close to one return the input untouched
pub const FACTOR_TOLERANCE: f32 = 0.001;

pub(crate) fn validate_factor(factor: f32) -> Result<(), DspError> {
    if factor.is_finite() && factor > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidParameter(format!(
            "pitch factor must be positive and finite, got {}",
            factor
        )))
    }
}

#[inline]
pub(crate) fn is_identity(factor: f32) -> bool {
    (factor - 1.0).abs() < FACTOR_TOLERANCE
}

/// Frequency ratio for a shift in semitones
#[inline]
pub fn semitones_to_factor(semitones: f32) -> f32 {
    2.0f32.powf(semitones / 12.0)
}

/// Semitones for a frequency ratio
#[inline]
pub fn factor_to_semitones(factor: f32) -> f32 {
    12.0 * factor.log2()
}

/// Pitch-shifting algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ShiftMethod {
    /// Time-Domain Pitch-Synchronous Overlap-Add
    TdPsola,
    /// STFT phase vocoder
    #[default]
    PhaseVocoder,
    /// Waveform-Similarity Overlap-Add
    Wsola,
}

impl ShiftMethod {
    pub const ALL: [ShiftMethod; 3] = [
        ShiftMethod::TdPsola,
        ShiftMethod::PhaseVocoder,
        ShiftMethod::Wsola,
    ];

    /// Name accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            ShiftMethod::TdPsola => "td_psola",
            ShiftMethod::PhaseVocoder => "phase_vocoder",
            ShiftMethod::Wsola => "wsola",
        }
    }
}

impl fmt::Display for ShiftMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShiftMethod {
    type Err = DspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ShiftMethod::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                DspError::InvalidParameter(format!(
                    "unknown pitch shift method '{}' (expected td_psola, phase_vocoder or wsola)",
                    s
                ))
            })
    }
}

/// How far to shift
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShiftAmount {
    /// Relative shift; 12 semitones is an octave
    Semitones(f32),
    /// Move the estimated current pitch to this frequency
    TargetHz(f32),
    /// Raw frequency ratio (new / old)
    Factor(f32),
}

/// Front end over the three pitch-shifting engines
pub struct PitchShifter {
    sample_rate: u32,
    psola: TdPsola,
    vocoder: PhaseVocoder,
    wsola: Wsola,
}

impl PitchShifter {
    pub fn new(sample_rate: u32) -> Result<Self, DspError> {
        if sample_rate == 0 {
            return Err(DspError::InvalidParameter(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            sample_rate,
            psola: TdPsola::new(sample_rate)?,
            vocoder: PhaseVocoder::new()?,
            wsola: Wsola::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shift by any [`ShiftAmount`]; target pitches are estimated with YIN
    pub fn shift(
        &self,
        samples: &[f32],
        amount: ShiftAmount,
        method: ShiftMethod,
    ) -> Result<Vec<f32>, DspError> {
        match amount {
            ShiftAmount::Semitones(semitones) => self.shift_by_semitones(samples, semitones, method),
            ShiftAmount::Factor(factor) => self.shift_by_factor(samples, factor, method),
            ShiftAmount::TargetHz(target) => {
                self.shift_to_target_pitch(samples, target, method, &YinEstimator::new())
            }
        }
    }

    /// Shift by `semitones`; shifts under a hundredth of a semitone are a no-op
    pub fn shift_by_semitones(
        &self,
        samples: &[f32],
        semitones: f32,
        method: ShiftMethod,
    ) -> Result<Vec<f32>, DspError> {
        if !semitones.is_finite() {
            return Err(DspError::InvalidParameter(format!(
                "semitones must be finite, got {}",
                semitones
            )));
        }
        if semitones.abs() < SEMITONE_TOLERANCE {
            return Ok(samples.to_vec());
        }
        self.shift_by_factor(samples, semitones_to_factor(semitones), method)
    }

    /// Shift by a raw frequency ratio
    pub fn shift_by_factor(
        &self,
        samples: &[f32],
        factor: f32,
        method: ShiftMethod,
    ) -> Result<Vec<f32>, DspError> {
        validate_factor(factor)?;
        debug!(factor, %method, samples = samples.len(), "pitch shift");

        match method {
            ShiftMethod::TdPsola => Ok(self.psola.shift(samples, factor)?.into_samples()),
            ShiftMethod::PhaseVocoder => self.vocoder.shift(samples, factor),
            ShiftMethod::Wsola => self.wsola.shift(samples, factor),
        }
    }

    /// Move the recording's pitch to `target_hz`
    pub fn shift_to_target_pitch(
        &self,
        samples: &[f32],
        target_hz: f32,
        method: ShiftMethod,
        estimator: &dyn PitchEstimator,
    ) -> Result<Vec<f32>, DspError> {
        if !(target_hz.is_finite() && target_hz > 0.0) {
            return Err(DspError::InvalidParameter(format!(
                "target pitch must be positive and finite, got {}",
                target_hz
            )));
        }

        let current = self.current_pitch(samples, estimator);
        let semitones = factor_to_semitones(target_hz / current);
        debug!(current, target_hz, semitones, "shifting to target pitch");
        self.shift_by_semitones(samples, semitones, method)
    }

    /// Estimated pitch of `samples`, falling back to 200 Hz when unvoiced
    pub fn current_pitch(&self, samples: &[f32], estimator: &dyn PitchEstimator) -> f32 {
        match estimator.estimate(samples, self.sample_rate) {
            Some(pitch) if pitch.is_finite() && pitch > 0.0 => pitch,
            _ => {
                warn!(
                    fallback = FALLBACK_PITCH_HZ,
                    "no voiced frames, assuming fallback pitch"
                );
                FALLBACK_PITCH_HZ
            }
        }
    }
}
