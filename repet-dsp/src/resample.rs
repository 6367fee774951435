//! Offline resampling to an exact output length.
//!
//! Output sample `j` reads the input at `j * (len - 1) / (new_len - 1)`, so
//! the first and last samples of the input are always hit exactly.

/// Interpolation kernel used between input samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Interpolation {
    /// Straight line between neighbours
    #[default]
    Linear,
    /// 4-point Catmull-Rom spline
    Cubic,
}

/// Stretch or squeeze `samples` to exactly `new_len` samples
pub fn resample_to_length(samples: &[f32], new_len: usize, interpolation: Interpolation) -> Vec<f32> {
    if new_len == 0 {
        return Vec::new();
    }
    match samples.len() {
        0 => return vec![0.0; new_len],
        1 => return vec![samples[0]; new_len],
        len if len == new_len => return samples.to_vec(),
        _ => {}
    }

    let scale = if new_len > 1 {
        (samples.len() - 1) as f64 / (new_len - 1) as f64
    } else {
        0.0
    };

    (0..new_len)
        .map(|j| {
            let pos = j as f64 * scale;
            match interpolation {
                Interpolation::Linear => linear_at(samples, pos),
                Interpolation::Cubic => cubic_at(samples, pos),
            }
        })
        .collect()
}

#[inline]
fn split_position(len: usize, pos: f64) -> (usize, f32) {
    let index = (pos.floor() as usize).min(len - 2);
    let frac = (pos - index as f64) as f32;
    (index, frac)
}

#[inline]
fn linear_at(samples: &[f32], pos: f64) -> f32 {
    let (i, t) = split_position(samples.len(), pos);
    samples[i] + (samples[i + 1] - samples[i]) * t
}

#[inline]
fn cubic_at(samples: &[f32], pos: f64) -> f32 {
    let last = samples.len() - 1;
    let (i, t) = split_position(samples.len(), pos);
    let y0 = samples[i.saturating_sub(1)];
    let y1 = samples[i];
    let y2 = samples[i + 1];
    let y3 = samples[(i + 2).min(last)];
    catmull_rom(y0, y1, y2, y3, t)
}

#[inline]
fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    let a0 = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let a1 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let a2 = -0.5 * y0 + 0.5 * y2;
    ((a0 * t + a1) * t + a2) * t + y1
}
