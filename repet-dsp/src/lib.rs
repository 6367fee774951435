//! DSP core for REPET
//!
//! This crate provides the offline processing pipeline:
//! - Separator: repeating background / non-repeating foreground split
//! - Pitch: TD-PSOLA, phase vocoder and WSOLA pitch shifting
//! - Resample: exact-length linear and cubic resampling

mod error;
pub mod pitch;
mod resample;
pub mod separator;

pub use error::DspError;
pub use pitch::{
    factor_to_semitones, semitones_to_factor, PhaseVocoder, PitchShifter, PsolaOutcome,
    ShiftAmount, ShiftMethod, TdPsola, Wsola,
};
pub use resample::{resample_to_length, Interpolation};
pub use separator::{RepetConfig, RepetSeparator, Separation};
