//! Offline Short-Time Fourier Transform.
//!
//! Frames are centred: the input is zero-padded by `fft_size / 2` on both
//! sides, so frame `t` is centred on sample `t * hop_length` and a signal of
//! `n` samples yields `1 + n / hop_length` frames. Analysis and synthesis use
//! the same periodic Hann window; the inverse divides by the summed squared
//! window so any hop up to `fft_size` reconstructs the input.

use crate::error::AnalysisError;
use crate::window::hann;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Real-valued time-frequency grid, bin-major (`data[bin * frames + frame]`)
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    bins: usize,
    frames: usize,
    data: Vec<f32>,
}

impl Grid {
    /// Zero-filled grid
    pub fn zeros(bins: usize, frames: usize) -> Self {
        Self {
            bins,
            frames,
            data: vec![0.0; bins * frames],
        }
    }

    /// Build a grid from a bin-major buffer of `bins * frames` values
    pub fn from_vec(bins: usize, frames: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), bins * frames, "grid shape mismatch");
        Self { bins, frames, data }
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn get(&self, bin: usize, frame: usize) -> f32 {
        self.data[bin * self.frames + frame]
    }

    #[inline]
    pub fn set(&mut self, bin: usize, frame: usize, value: f32) {
        self.data[bin * self.frames + frame] = value;
    }

    /// Values of one frequency bin over time
    pub fn row(&self, bin: usize) -> &[f32] {
        &self.data[bin * self.frames..(bin + 1) * self.frames]
    }

    pub fn row_mut(&mut self, bin: usize) -> &mut [f32] {
        &mut self.data[bin * self.frames..(bin + 1) * self.frames]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Apply `f` to every value, returning a grid of the same shape
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            bins: self.bins,
            frames: self.frames,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two grids of the same shape value by value
    pub fn zip_map(&self, other: &Grid, f: impl Fn(f32, f32) -> f32) -> Self {
        assert_eq!(
            (self.bins, self.frames),
            (other.bins, other.frames),
            "grid shape mismatch"
        );
        Self {
            bins: self.bins,
            frames: self.frames,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

/// Complex STFT matrix indexed `[bin, frame]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    fft_size: usize,
    hop_length: usize,
    data: Vec<Complex<f32>>,
}

impl Spectrogram {
    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    #[inline]
    pub fn get(&self, bin: usize, frame: usize) -> Complex<f32> {
        self.data[bin * self.frames + frame]
    }

    /// Magnitude view
    pub fn magnitude(&self) -> Grid {
        Grid::from_vec(
            self.bins,
            self.frames,
            self.data.iter().map(|c| c.norm()).collect(),
        )
    }

    /// Phase view in radians
    pub fn phase(&self) -> Grid {
        Grid::from_vec(
            self.bins,
            self.frames,
            self.data.iter().map(|c| c.arg()).collect(),
        )
    }

    /// Recombine magnitude and phase as `magnitude * exp(i * phase)`
    pub fn from_polar(magnitude: &Grid, phase: &Grid, fft_size: usize, hop_length: usize) -> Self {
        assert_eq!(
            (magnitude.bins, magnitude.frames),
            (phase.bins, phase.frames),
            "magnitude and phase shapes differ"
        );
        let data = magnitude
            .data
            .iter()
            .zip(&phase.data)
            .map(|(&mag, &ph)| Complex::from_polar(mag, ph))
            .collect();
        Self {
            bins: magnitude.bins,
            frames: magnitude.frames,
            fft_size,
            hop_length,
            data,
        }
    }

    /// Build from frame-major columns (each `bins` long)
    pub fn from_frames(frames: &[Vec<Complex<f32>>], fft_size: usize, hop_length: usize) -> Self {
        let bins = fft_size / 2 + 1;
        let num_frames = frames.len();
        let mut data = vec![Complex::new(0.0, 0.0); bins * num_frames];
        for (t, column) in frames.iter().enumerate() {
            debug_assert_eq!(column.len(), bins);
            for (k, &value) in column.iter().enumerate().take(bins) {
                data[k * num_frames + t] = value;
            }
        }
        Self {
            bins,
            frames: num_frames,
            fft_size,
            hop_length,
            data,
        }
    }

    /// One time frame across all bins
    pub fn frame(&self, frame: usize) -> Vec<Complex<f32>> {
        (0..self.bins).map(|k| self.get(k, frame)).collect()
    }
}

/// Short-Time Fourier Transform processor
pub struct Stft {
    fft_size: usize,
    hop_length: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// Create a transform with the given frame size and hop
    pub fn new(fft_size: usize, hop_length: usize) -> Result<Self, AnalysisError> {
        if fft_size < 2 || fft_size % 2 != 0 {
            return Err(AnalysisError::InvalidFftSize(fft_size));
        }
        if hop_length == 0 || hop_length > fft_size {
            return Err(AnalysisError::InvalidHopLength {
                hop_length,
                fft_size,
            });
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        Ok(Self {
            fft_size,
            hop_length,
            window: hann(fft_size),
            forward,
            inverse,
        })
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    #[inline]
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of positive frequency bins (size/2 + 1)
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of centred frames for a signal of `len` samples
    #[inline]
    pub fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Analyse a whole signal
    pub fn forward(&self, samples: &[f32]) -> Spectrogram {
        let n = self.fft_size;
        let pad = n / 2;
        let bins = self.num_bins();
        let frames = self.num_frames(samples.len());

        let mut data = vec![Complex::new(0.0, 0.0); bins * frames];
        let mut work = vec![Complex::new(0.0, 0.0); n];

        for t in 0..frames {
            let start = t * self.hop_length;
            for (i, slot) in work.iter_mut().enumerate() {
                // Position in the unpadded signal
                let sample = (start + i)
                    .checked_sub(pad)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.forward.process(&mut work);

            for k in 0..bins {
                data[k * frames + t] = work[k];
            }
        }

        Spectrogram {
            bins,
            frames,
            fft_size: n,
            hop_length: self.hop_length,
            data,
        }
    }

    /// Resynthesise exactly `length` samples from a spectrogram
    pub fn inverse(&self, spectrogram: &Spectrogram, length: usize) -> Vec<f32> {
        let n = self.fft_size;
        let pad = n / 2;
        let bins = self.num_bins();
        let frames = spectrogram.frames();
        debug_assert_eq!(spectrogram.bins(), bins);

        if frames == 0 {
            return vec![0.0; length];
        }

        let expected_len = n + self.hop_length * (frames - 1);
        let mut output = vec![0.0f32; expected_len];
        let mut window_sum = vec![0.0f32; expected_len];
        let mut work = vec![Complex::new(0.0, 0.0); n];
        let norm = 1.0 / n as f32;

        for t in 0..frames {
            // Reconstruct full spectrum from positive frequencies (Hermitian symmetry)
            for k in 0..bins {
                work[k] = spectrogram.get(k, t);
            }
            work[0].im = 0.0;
            work[n / 2].im = 0.0;
            for k in 1..n / 2 {
                work[n - k] = work[k].conj();
            }

            self.inverse.process(&mut work);

            let start = t * self.hop_length;
            for i in 0..n {
                let w = self.window[i];
                output[start + i] += work[i].re * norm * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &weight) in output.iter_mut().zip(&window_sum) {
            if weight > f32::MIN_POSITIVE {
                *sample /= weight;
            }
        }

        let mut result: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        result.resize(length, 0.0);
        result
    }
}
