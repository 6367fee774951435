//! Settings persistence for REPET
//!
//! Stores the defaults the command line falls back to: STFT geometry,
//! pitch-shift method, working sample rate and output folder.

use repet_dsp::{RepetConfig, ShiftMethod};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// User settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Separator FFT size
    pub fft_size: usize,
    /// Separator hop length
    pub hop_length: usize,
    /// Default pitch-shift method
    pub method: ShiftMethod,
    /// Rate recordings are converted to before pitch shifting
    pub sample_rate: u32,
    /// Folder for separated stems when no explicit path is given
    pub output_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let separator = RepetConfig::default();
        Self {
            fft_size: separator.fft_size,
            hop_length: separator.hop_length,
            method: ShiftMethod::default(),
            sample_rate: 22050,
            output_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from the default location
    ///
    /// Returns defaults if the file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save settings to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save settings to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repet")
            .join("config.txt")
    }

    /// Separator geometry described by these settings
    pub fn separator_config(&self) -> RepetConfig {
        RepetConfig {
            fft_size: self.fft_size,
            hop_length: self.hop_length,
        }
    }

    /// Parse settings from simple key=value format
    fn parse(content: &str) -> Self {
        let mut settings = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let applied = match key {
                "fft_size" => parse_positive::<usize>(value).map(|v| settings.fft_size = v),
                "hop_length" => parse_positive::<usize>(value).map(|v| settings.hop_length = v),
                "method" => value.parse::<ShiftMethod>().ok().map(|m| settings.method = m),
                "sample_rate" => parse_positive::<u32>(value).map(|v| settings.sample_rate = v),
                "output_dir" => {
                    settings.output_dir =
                        (!value.is_empty()).then(|| PathBuf::from(value));
                    Some(())
                }
                _ => Some(()), // Ignore unknown keys
            };

            if applied.is_none() {
                warn!(key, value, "ignoring invalid setting");
            }
        }

        settings
    }

    /// Serialize settings to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# REPET Configuration".to_string(),
            format!("fft_size={}", self.fft_size),
            format!("hop_length={}", self.hop_length),
            format!("method={}", self.method),
            format!("sample_rate={}", self.sample_rate),
        ];

        if let Some(ref dir) = self.output_dir {
            lines.push(format!("output_dir={}", dir.display()));
        }

        lines.join("\n")
    }
}

fn parse_positive<T>(value: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value.parse().ok().filter(|v| *v > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Settings::parse(""), Settings::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "fft_size=4096\nhop_length=1024\nmethod=WSOLA\nsample_rate=44100\noutput_dir=/tmp/stems";
        let settings = Settings::parse(content);
        assert_eq!(settings.fft_size, 4096);
        assert_eq!(settings.hop_length, 1024);
        assert_eq!(settings.method, ShiftMethod::Wsola);
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.output_dir, Some(PathBuf::from("/tmp/stems")));
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\nmethod = td_psola\n# Another comment";
        let settings = Settings::parse(content);
        assert_eq!(settings.method, ShiftMethod::TdPsola);
    }

    #[test]
    fn test_bad_values_and_unknown_keys_ignored() {
        let content = "fft_size=zero\nhop_length=0\nmethod=granular\nsample_rate=-5\ncolour=blue\nnot a setting";
        assert_eq!(Settings::parse(content), Settings::default());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let settings = Settings {
            fft_size: 1024,
            hop_length: 256,
            method: ShiftMethod::TdPsola,
            sample_rate: 16000,
            output_dir: Some(PathBuf::from("/test/path")),
        };

        let parsed = Settings::parse(&settings.serialize());
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join("repet-settings-test")
            .join("config.txt");
        let settings = Settings {
            sample_rate: 48000,
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_separator_config() {
        let config = Settings::default().separator_config();
        assert_eq!(config, RepetConfig::default());
    }
}
