//! Signal analysis for REPET
//!
//! Provides the mono signal type, STFT/ISTFT, FFT autocorrelation, pitch-mark
//! detection and fundamental-frequency estimation shared by the separator and
//! the pitch-shifting engines.

mod correlation;
mod error;
mod marks;
mod pitch;
mod signal;
mod stft;
pub mod synth;
mod window;

pub use correlation::{argmax, autocorrelation, dot, Autocorrelator};
pub use error::AnalysisError;
pub use marks::{find_marks, median_period, PitchMarkDetector};
pub use pitch::{
    PitchEstimator, PitchFrame, YinEstimator, DEFAULT_MAX_FREQ, DEFAULT_MIN_FREQ,
    FALLBACK_PITCH_HZ,
};
pub use signal::{normalize_peak, peak, Signal};
pub use stft::{Grid, Spectrogram, Stft};
pub use window::{apply_hann, hann};

/// Re-exported so downstream crates share one complex type
pub use rustfft::num_complex::Complex;
