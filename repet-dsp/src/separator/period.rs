//! Repetition period estimation from the beat spectrum

use repet_analysis::{argmax, Autocorrelator, Grid};

/// Number of low-frequency bins averaged into the beat spectrum
pub const BEAT_SPECTRUM_BINS: usize = 100;
/// Shortest repetition considered, in seconds
pub const MIN_PERIOD_SECS: f32 = 1.0;
/// Longest repetition considered, in seconds
pub const MAX_PERIOD_SECS: f32 = 10.0;

/// Mean autocorrelation of the lowest magnitude rows, non-negative lags only.
///
/// The result has one value per frame lag, `0..magnitude.frames()`.
pub fn beat_spectrum(magnitude: &Grid) -> Vec<f32> {
    let frames = magnitude.frames();
    let rows = magnitude.bins().min(BEAT_SPECTRUM_BINS);
    if frames == 0 || rows == 0 {
        return Vec::new();
    }

    let mut autocorrelator = Autocorrelator::new();
    let mut sum = vec![0.0f64; frames];
    for bin in 0..rows {
        for (acc, value) in sum.iter_mut().zip(autocorrelator.compute(magnitude.row(bin))) {
            *acc += value as f64;
        }
    }

    sum.into_iter().map(|v| (v / rows as f64) as f32).collect()
}

/// Dominant repetition period of a magnitude spectrogram, in frames (at least 1).
///
/// Searches lags between one and ten seconds. When the recording is too short
/// to hold the longest lag, a quarter of the beat spectrum length is used
/// instead.
pub fn find_repeating_period(magnitude: &Grid, sample_rate: u32, hop_length: usize) -> usize {
    let spectrum = beat_spectrum(magnitude);
    let frames_per_sec = sample_rate as f32 / hop_length as f32;
    let min_lag = (MIN_PERIOD_SECS * frames_per_sec) as usize;
    let max_lag = (MAX_PERIOD_SECS * frames_per_sec) as usize;

    let period = if spectrum.len() > max_lag && min_lag < max_lag {
        argmax(&spectrum[min_lag..max_lag])
            .map(|peak| peak + min_lag)
            .unwrap_or(min_lag)
    } else {
        tracing::debug!(
            beat_spectrum_len = spectrum.len(),
            max_lag,
            "recording shorter than the period search range, using fallback"
        );
        spectrum.len() / 4
    };

    period.max(1)
}
