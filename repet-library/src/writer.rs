//! WAV output

use repet_analysis::Signal;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while writing audio
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

impl From<hound::Error> for SaveError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => SaveError::Io(io),
            other => SaveError::Encoding(other.to_string()),
        }
    }
}

/// Write `signal` as a mono 32-bit float WAV file, creating parent directories
pub fn save_wav(path: &Path, signal: &Signal) -> Result<(), SaveError> {
    if signal.sample_rate() == 0 {
        return Err(SaveError::InvalidSampleRate);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in signal.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!(
        path = %path.display(),
        samples = signal.len(),
        sample_rate = signal.sample_rate(),
        "wav written"
    );
    Ok(())
}
