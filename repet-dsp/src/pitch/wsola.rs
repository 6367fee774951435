//! WSOLA (Waveform-Similarity Overlap-Add) pitch shifting.
//!
//! The input is first resampled by the shift factor, which moves pitch and
//! duration together. WSOLA then stretches it back to the original length:
//! frames are read at a variable analysis hop and written at a fixed
//! synthesis hop. Each read position is nudged within a small search window
//! so that the audio just before it matches the audio already written just
//! before the write position.

use super::{is_identity, validate_factor, OUTPUT_PEAK};
use crate::error::DspError;
use crate::resample::{resample_to_length, Interpolation};
use repet_analysis::{dot, hann, normalize_peak};
use tracing::debug;

pub const FRAME_SIZE: usize = 2048;
pub const SYNTHESIS_HOP: usize = 512;
pub const MIN_ANALYSIS_HOP: usize = 32;
/// Samples compared when aligning a frame
pub const TEMPLATE_SIZE: usize = FRAME_SIZE / 4;
/// Read positions tried on each side of the natural one
pub const SEARCH_RANGE: usize = 50;

/// WSOLA pitch shifter
#[derive(Debug, Clone)]
pub struct Wsola {
    window: Vec<f32>,
}

impl Default for Wsola {
    fn default() -> Self {
        Self::new()
    }
}

impl Wsola {
    pub fn new() -> Self {
        Self {
            window: hann(FRAME_SIZE),
        }
    }

    /// Shift pitch by `factor` (new / old frequency) keeping the length
    pub fn shift(&self, samples: &[f32], factor: f32) -> Result<Vec<f32>, DspError> {
        validate_factor(factor)?;
        if is_identity(factor) {
            return Ok(samples.to_vec());
        }

        let resampled_len = (samples.len() as f64 / factor as f64) as usize;
        if resampled_len == 0 {
            return Ok(samples.to_vec());
        }
        let resampled = resample_to_length(samples, resampled_len, Interpolation::Linear);

        match self.stretch_to(&resampled, samples.len()) {
            Ok(mut output) => {
                normalize_peak(&mut output, OUTPUT_PEAK);
                Ok(output)
            }
            Err(err @ DspError::DegenerateInput(_)) => {
                debug!(%err, "WSOLA output left silent");
                Ok(vec![0.0; samples.len()])
            }
            Err(err) => Err(err),
        }
    }

    /// Time-stretch `input` to `target_len` samples without changing its pitch
    fn stretch_to(&self, input: &[f32], target_len: usize) -> Result<Vec<f32>, DspError> {
        if target_len < FRAME_SIZE {
            return Err(DspError::DegenerateInput(format!(
                "{} samples is shorter than one {} sample frame",
                target_len, FRAME_SIZE
            )));
        }

        let stretch = input.len() as f64 / target_len as f64;
        let analysis_hop = ((SYNTHESIS_HOP as f64 * stretch) as usize).max(MIN_ANALYSIS_HOP);
        let num_frames = (target_len - FRAME_SIZE) / SYNTHESIS_HOP;

        let mut output = vec![0.0f32; target_len];
        let mut written = 0usize;

        for i in 0..num_frames {
            let natural = i * analysis_hop;
            let write_pos = i * SYNTHESIS_HOP;

            let read_pos = if i == 0 {
                natural
            } else {
                let template = &output[write_pos - TEMPLATE_SIZE..write_pos];
                best_alignment(input, template, natural)
            };

            if read_pos >= input.len() {
                break;
            }

            for (j, &w) in self.window.iter().enumerate() {
                let sample = input.get(read_pos + j).copied().unwrap_or(0.0);
                output[write_pos + j] += sample * w;
            }
            written += 1;
        }

        debug!(
            frames = written,
            analysis_hop,
            stretch,
            "WSOLA stretch"
        );
        Ok(output)
    }
}

/// Read position near `natural` whose samples best match `template`.
///
/// Candidates run from `natural - SEARCH_RANGE` up to, but not including,
/// `natural + SEARCH_RANGE`, and must leave a full frame ahead. Positions
/// within one frame of the end keep the natural position.
fn best_alignment(input: &[f32], template: &[f32], natural: usize) -> usize {
    let t = template.len();
    let Some(last_start) = input.len().checked_sub(FRAME_SIZE) else {
        return natural;
    };
    if natural >= last_start {
        return natural;
    }

    let lo = natural.saturating_sub(SEARCH_RANGE);
    let hi = (natural + SEARCH_RANGE).min(last_start);

    let mut best_pos = natural;
    let mut best_score = f64::NEG_INFINITY;
    for pos in lo..hi {
        let Some(candidate) = input.get(pos..pos + t) else {
            continue;
        };
        let score = dot(template, candidate);
        if score > best_score {
            best_score = score;
            best_pos = pos;
        }
    }
    best_pos
}
