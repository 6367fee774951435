//! File-to-file processing
//!
//! Thin wrappers that load a recording, run the separator or a pitch shifter
//! on it and write the results back out as WAV.

use crate::loader::{AudioLoader, LoadError};
use crate::writer::{save_wav, SaveError};
use repet_dsp::{
    DspError, PitchShifter, RepetConfig, RepetSeparator, Separation, ShiftAmount, ShiftMethod,
};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Errors from the file-level conveniences
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to load input: {0}")]
    Load(#[from] LoadError),
    #[error("Failed to save output: {0}")]
    Save(#[from] SaveError),
    #[error(transparent)]
    Dsp(#[from] DspError),
}

/// Pitch-shift `input` and write the result to `output`.
///
/// With `sample_rate` set, the recording is converted to that rate first and
/// written at it; otherwise the file's own rate is kept.
pub fn process_file(
    input: &Path,
    output: &Path,
    amount: ShiftAmount,
    method: ShiftMethod,
    sample_rate: Option<u32>,
) -> Result<(), ProcessError> {
    let started = Instant::now();
    let loader = sample_rate.map_or_else(AudioLoader::new, AudioLoader::with_sample_rate);
    let signal = loader.load(input)?.signal;

    let shifter = PitchShifter::new(signal.sample_rate())?;
    let shifted = shifter.shift(signal.samples(), amount, method)?;
    save_wav(output, &signal.with_samples(shifted))?;

    info!(
        input = %input.display(),
        output = %output.display(),
        ?amount,
        %method,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pitch shift complete"
    );
    Ok(())
}

/// Separate `input` into foreground (vocal) and background (instrumental).
///
/// Each stem is written only when a path is given for it. The separation is
/// returned either way.
pub fn separate_file(
    input: &Path,
    vocal_out: Option<&Path>,
    instrumental_out: Option<&Path>,
    config: RepetConfig,
) -> Result<Separation, ProcessError> {
    let started = Instant::now();
    let separator = RepetSeparator::new(config)?;
    let signal = AudioLoader::new().load(input)?.signal;
    let separation = separator.separate(&signal)?;

    if let Some(path) = vocal_out {
        save_wav(path, &separation.foreground)?;
    }
    if let Some(path) = instrumental_out {
        save_wav(path, &separation.background)?;
    }

    info!(
        input = %input.display(),
        period_secs = separation.period_secs,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "separation complete"
    );
    Ok(separation)
}
