//! Audio file loading and decoding

use repet_analysis::Signal;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during audio loading
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// A decoded recording, downmixed to mono
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    /// Mono samples at the loader's output rate
    pub signal: Signal,
    /// Sample rate stored in the file
    pub source_sample_rate: u32,
    /// Channel count stored in the file
    pub channels: u16,
}

/// Audio file loader using Symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioLoader {
    /// `None` keeps the file's own rate
    target_sample_rate: Option<u32>,
}

impl AudioLoader {
    /// Loader that keeps each file's native sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that converts every file to `target_sample_rate`
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate: Some(target_sample_rate),
        }
    }

    /// Load, decode and downmix an audio file
    pub fn load(&self, path: &Path) -> Result<LoadedAudio, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => LoadError::UnsupportedFormat,
                SymphoniaError::IoError(io) => LoadError::Io(io),
                other => LoadError::Decode(other.to_string()),
            })?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let mut channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => {
                    skipped_packets += 1;
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            // Convert to f32 interleaved
            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(sample_buf.samples());
        }

        if skipped_packets > 0 {
            warn!(
                path = %path.display(),
                skipped_packets,
                "skipped undecodable packets"
            );
        }

        let mono = downmix(&interleaved, channels);

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != source_sample_rate => {
                (resample(&mono, source_sample_rate, target)?, target)
            }
            _ => (mono, source_sample_rate),
        };

        debug!(
            path = %path.display(),
            source_sample_rate,
            sample_rate,
            channels,
            samples = samples.len(),
            "audio loaded"
        );

        Ok(LoadedAudio {
            signal: Signal::new(samples, sample_rate),
            source_sample_rate,
            channels,
        })
    }
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert mono audio between sample rates
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, LoadError> {
    use rubato::{FftFixedInOut, Resampler};

    if source_rate == 0 || target_rate == 0 {
        return Err(LoadError::Resample(format!(
            "cannot resample from {} Hz to {} Hz",
            source_rate, target_rate
        )));
    }
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, 1024, 1)
            .map_err(|e| LoadError::Resample(e.to_string()))?;

    let frames = samples.len();
    let expected = (frames as u64 * target_rate as u64 / source_rate as u64) as usize;
    let delay = resampler.output_delay();
    let chunk_size = resampler.input_frames_next();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + chunk_size);

    let mut process = |chunk: &[f32], output: &mut Vec<f32>| -> Result<(), LoadError> {
        let resampled = resampler
            .process(&[chunk], None)
            .map_err(|e| LoadError::Resample(e.to_string()))?;
        output.extend_from_slice(&resampled[0]);
        Ok(())
    };

    let mut pos = 0;
    while pos + chunk_size <= frames {
        process(&samples[pos..pos + chunk_size], &mut output)?;
        pos += chunk_size;
    }

    // Zero-pad the tail into one last chunk
    if pos < frames {
        let mut tail = samples[pos..].to_vec();
        tail.resize(chunk_size, 0.0);
        process(&tail, &mut output)?;
    }

    // Flush until the delayed output covers the whole signal
    let silence = vec![0.0f32; chunk_size];
    while output.len() < expected + delay {
        process(&silence, &mut output)?;
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&stereo, 1), stereo.to_vec());
    }

    #[test]
    fn test_resample_length() {
        let input = vec![0.25f32; 44100];
        let output = resample(&input, 44100, 22050).unwrap();
        assert_eq!(output.len(), 22050);
        let output = resample(&input[..1000], 44100, 48000).unwrap();
        assert_eq!(output.len(), 1088);
    }

    #[test]
    fn test_resample_keeps_timing() {
        let mut input = vec![0.0f32; 44100];
        input[10_000] = 1.0;
        input[44_000] = 1.0;
        let output = resample(&input, 44100, 22050).unwrap();
        assert_eq!(output.len(), 22050);

        let onset = output[..15_000]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((onset as i64 - 5000).abs() <= 2, "impulse landed at {}", onset);

        // The last impulse survives the flush
        let tail_energy: f32 = output[21_900..].iter().map(|s| s * s).sum();
        assert!(tail_energy > 0.01, "tail energy {}", tail_energy);
    }

    #[test]
    fn test_resample_rejects_zero_rate() {
        assert!(matches!(
            resample(&[0.1; 10], 0, 22050),
            Err(LoadError::Resample(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("repet-loader-does-not-exist.wav");
        assert!(matches!(
            AudioLoader::new().load(&path),
            Err(LoadError::Io(_))
        ));
    }
}
