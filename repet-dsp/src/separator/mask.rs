//! Repeating-spectrogram model and soft masks

use repet_analysis::Grid;

/// Added to numerator and denominator so silent bins map to a mask of one
pub const MASK_EPSILON: f32 = 1e-10;

/// Model of the repeating background for a magnitude spectrogram.
///
/// With at least two full periods the element-wise median across segments is
/// tiled over the recording; otherwise each bin is median filtered over a
/// window one period wide.
pub fn repeating_spectrogram(magnitude: &Grid, period: usize) -> Grid {
    let period = period.max(1);
    let frames = magnitude.frames();
    let repetitions = frames / period;

    if repetitions < 2 {
        tracing::debug!(period, frames, "fewer than two repetitions, median filtering");
        return median_filter_rows(magnitude, period);
    }

    let segment = median_segment(magnitude, period, repetitions);
    tile_segment(&segment, frames)
}

/// Element-wise median of the first `count` full segments of `period` frames
fn median_segment(magnitude: &Grid, period: usize, count: usize) -> Grid {
    let mut segment = Grid::zeros(magnitude.bins(), period);
    let mut values = Vec::with_capacity(count);

    for bin in 0..magnitude.bins() {
        let row = magnitude.row(bin);
        for offset in 0..period {
            values.clear();
            values.extend((0..count).map(|s| row[s * period + offset]));
            segment.set(bin, offset, median(&mut values));
        }
    }
    segment
}

/// Repeat `segment` to `frames` columns, holding the last tiled column for
/// any remainder shorter than a period
fn tile_segment(segment: &Grid, frames: usize) -> Grid {
    let period = segment.frames();
    let tiled = (frames / period) * period;
    let mut out = Grid::zeros(segment.bins(), frames);

    for bin in 0..segment.bins() {
        let source = segment.row(bin);
        let row = out.row_mut(bin);
        for (t, slot) in row.iter_mut().enumerate() {
            let column = if t < tiled { t % period } else { period - 1 };
            *slot = source[column];
        }
    }
    out
}

/// Running median along time with mirrored edges.
///
/// For an even `width` the window covers `t - width/2 .. t + width/2` and the
/// upper of the two middle values is taken.
pub fn median_filter_rows(grid: &Grid, width: usize) -> Grid {
    let width = width.max(1);
    let frames = grid.frames();
    let mut out = Grid::zeros(grid.bins(), frames);
    if frames == 0 {
        return out;
    }

    let before = (width / 2) as isize;
    let mut window = Vec::with_capacity(width);

    for bin in 0..grid.bins() {
        let row = grid.row(bin);
        for t in 0..frames {
            window.clear();
            window.extend((0..width as isize).map(|k| row[reflect(t as isize + k - before, frames)]));
            let rank = width / 2;
            let (_, value, _) = window.select_nth_unstable_by(rank, f32::total_cmp);
            out.set(bin, t, *value);
        }
    }
    out
}

/// Half-sample symmetric reflection (`d c b a | a b c d | d c b a`)
#[inline]
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let m = index.rem_euclid(2 * len);
    if m < len {
        m as usize
    } else {
        (2 * len - 1 - m) as usize
    }
}

/// Median of a non-empty buffer (reorders it); even counts average the middle pair
fn median(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Complementary soft masks for the background and foreground
#[derive(Debug, Clone)]
pub struct Mask {
    background: Grid,
}

impl Mask {
    /// `min((R + eps) / (S + eps), 1)` per bin, `R` the repeating model and
    /// `S` the mixture magnitude
    pub fn from_repeating(repeating: &Grid, magnitude: &Grid) -> Self {
        let background = repeating.zip_map(magnitude, |r, s| {
            ((r + MASK_EPSILON) / (s + MASK_EPSILON)).clamp(0.0, 1.0)
        });
        Self { background }
    }

    pub fn background(&self) -> &Grid {
        &self.background
    }

    /// `1 - background`, bin by bin
    pub fn foreground(&self) -> Grid {
        self.background.map(|b| 1.0 - b)
    }

    /// Mean background weight, handy for logging how repetitive a mix is
    pub fn mean_background(&self) -> f32 {
        let values = self.background.as_slice();
        if values.is_empty() {
            return 0.0;
        }
        (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_from_rows(rows: &[&[f32]]) -> Grid {
        let frames = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Grid::from_vec(rows.len(), frames, data)
    }

    #[test]
    fn test_median_across_segments() {
        // Period 2, three full segments plus one leftover frame
        let magnitude = grid_from_rows(&[&[1.0, 10.0, 3.0, 20.0, 2.0, 90.0, 7.0]]);
        let repeating = repeating_spectrogram(&magnitude, 2);
        assert_eq!(repeating.as_slice(), &[2.0, 20.0, 2.0, 20.0, 2.0, 20.0, 20.0]);
    }

    #[test]
    fn test_even_segment_count_averages() {
        let magnitude = grid_from_rows(&[&[1.0, 4.0, 3.0, 8.0]]);
        let repeating = repeating_spectrogram(&magnitude, 2);
        assert_eq!(repeating.as_slice(), &[2.0, 6.0, 2.0, 6.0]);
    }

    #[test]
    fn test_median_filter_fallback() {
        // Period 3 over 4 frames leaves a single repetition
        let magnitude = grid_from_rows(&[&[5.0, 1.0, 9.0, 2.0]]);
        let repeating = repeating_spectrogram(&magnitude, 3);
        // Windows (mirrored): [5,5,1] [5,1,9] [1,9,2] [9,2,2]
        assert_eq!(repeating.as_slice(), &[5.0, 5.0, 2.0, 2.0]);
    }

    #[test]
    fn test_median_filter_even_width_uses_upper_middle() {
        let grid = grid_from_rows(&[&[1.0, 2.0, 3.0, 4.0]]);
        // Width 2 at t covers t-1..=t
        let filtered = median_filter_rows(&grid, 2);
        assert_eq!(filtered.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reflect() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(-5, 2), 0);
    }

    #[test]
    fn test_masks_are_complementary_and_bounded() {
        let magnitude = grid_from_rows(&[&[0.0, 1.0, 2.0, 0.5], &[3.0, 0.25, 0.0, 8.0]]);
        let repeating = grid_from_rows(&[&[0.0, 2.0, 1.0, 0.1], &[1.0, 0.25, 0.3, 8.0]]);
        let mask = Mask::from_repeating(&repeating, &magnitude);
        let foreground = mask.foreground();

        for (&b, &f) in mask.background().as_slice().iter().zip(foreground.as_slice()) {
            assert!((0.0..=1.0).contains(&b));
            assert!((0.0..=1.0).contains(&f));
            assert!((b + f - 1.0).abs() <= f32::EPSILON);
        }
        // Silent bin with silent model is fully background
        assert_eq!(mask.background().get(0, 0), 1.0);
        // Model above the mixture clamps to one
        assert_eq!(mask.background().get(0, 1), 1.0);
        assert!((mask.background().get(0, 2) - 0.5).abs() < 1e-6);
    }
}
