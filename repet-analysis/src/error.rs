use thiserror::Error;

/// Errors raised when an analysis primitive is configured with unusable parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("FFT size must be even and at least 2, got {0}")]
    InvalidFftSize(usize),
    #[error("Hop length must be between 1 and the FFT size ({fft_size}), got {hop_length}")]
    InvalidHopLength { hop_length: usize, fft_size: usize },
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
    #[error("Frequency range {min_hz} - {max_hz} Hz is invalid")]
    InvalidFrequencyRange { min_hz: f32, max_hz: f32 },
}
