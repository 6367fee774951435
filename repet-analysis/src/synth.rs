//! Synthetic test signals
//!
//! A repeating three-tone "instrumental" pattern plus a frequency modulated
//! "vocal" tone gives a mixture whose background period is known exactly.

use crate::signal::{normalize_peak, Signal};
use std::f64::consts::PI;

/// Pure sine at `freq` Hz
pub fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    let step = 2.0 * PI * freq as f64 / sample_rate as f64;
    (0..len)
        .map(|i| (amplitude as f64 * (step * i as f64).sin()) as f32)
        .collect()
}

/// `n` evenly spaced points from `0` to `end` inclusive
fn linspace(end: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 { end / (n - 1) as f64 } else { 0.0 };
    (0..n).map(move |i| i as f64 * step)
}

/// One `period_secs` cycle of A3 + A4 + E4, tiled to `duration_secs`
pub fn repeating_pattern(period_secs: f64, duration_secs: f64, sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as f64 * duration_secs) as usize;
    let pattern_len = (sample_rate as f64 * period_secs) as usize;
    if pattern_len == 0 {
        return vec![0.0; total];
    }

    let pattern: Vec<f32> = linspace(period_secs, pattern_len)
        .map(|t| {
            (0.3 * (2.0 * PI * 220.0 * t).sin()
                + 0.2 * (2.0 * PI * 440.0 * t).sin()
                + 0.15 * (2.0 * PI * 330.0 * t).sin()) as f32
        })
        .collect();

    pattern.iter().copied().cycle().take(total).collect()
}

/// Melody that plays `notes` in equal slots and restarts every `period_secs`.
///
/// Unlike the sustained chord of [`repeating_pattern`], each bin switches on
/// and off once per period, so the repetition shows up in the magnitudes.
pub fn note_sequence(notes: &[f32], period_secs: f64, duration_secs: f64, sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as f64 * duration_secs) as usize;
    if notes.is_empty() || period_secs <= 0.0 {
        return vec![0.0; total];
    }

    let slot = period_secs / notes.len() as f64;
    (0..total)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let within = t % period_secs;
            let note = ((within / slot) as usize).min(notes.len() - 1);
            (0.5 * (2.0 * PI * notes[note] as f64 * t).sin()) as f32
        })
        .collect()
}

/// 523 Hz carrier whose frequency swings ±50 Hz at 0.5 Hz
pub fn fm_tone(duration_secs: f64, sample_rate: u32) -> Vec<f32> {
    let total = (sample_rate as f64 * duration_secs) as usize;
    linspace(duration_secs, total)
        .map(|t| {
            let freq = 523.0 + 50.0 * (2.0 * PI * 0.5 * t).sin();
            (0.2 * (2.0 * PI * freq * t).sin()) as f32
        })
        .collect()
}

/// Mixture with its known components, each peak-normalised to 0.9
#[derive(Debug, Clone)]
pub struct TestMixture {
    pub mixture: Signal,
    pub background: Signal,
    pub foreground: Signal,
}

/// Build the repeating-pattern + FM-tone mixture used to exercise separation
pub fn test_mixture(duration_secs: f64, period_secs: f64, sample_rate: u32) -> TestMixture {
    let mut background = repeating_pattern(period_secs, duration_secs, sample_rate);
    let mut foreground = fm_tone(duration_secs, sample_rate);

    let mut mixture: Vec<f32> = background
        .iter()
        .zip(&foreground)
        .map(|(&b, &f)| b + f)
        .collect();

    normalize_peak(&mut mixture, 0.9);
    normalize_peak(&mut background, 0.9);
    normalize_peak(&mut foreground, 0.9);

    TestMixture {
        mixture: Signal::new(mixture, sample_rate),
        background: Signal::new(background, sample_rate),
        foreground: Signal::new(foreground, sample_rate),
    }
}
