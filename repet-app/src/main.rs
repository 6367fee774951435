//! REPET - repeating-pattern separation and pitch shifting
//!
//! Command-line front end over the separator and the pitch shifters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repet_dsp::{RepetConfig, ShiftAmount, ShiftMethod};
use repet_library::{process_file, separate_file, Settings};

#[derive(Parser, Debug)]
#[command(name = "repet", version, about = "Repeating-pattern separation and pitch shifting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Split a recording into vocal (foreground) and instrumental (background)
    Separate(SeparateArgs),
    /// Change pitch without changing duration
    Shift(ShiftArgs),
    /// Show the settings file, or write the current settings to it
    Config {
        /// Write the settings file (defaults if none exists yet)
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args, Debug)]
struct SeparateArgs {
    /// Input audio file
    input: PathBuf,
    /// Where to write the foreground
    #[arg(long)]
    vocal: Option<PathBuf>,
    /// Where to write the background
    #[arg(long)]
    instrumental: Option<PathBuf>,
    /// FFT size
    #[arg(long)]
    n_fft: Option<usize>,
    /// Hop length in samples
    #[arg(long)]
    hop_length: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("amount")
        .required(true)
        .args(["semitones", "factor", "target_pitch"]),
))]
struct ShiftArgs {
    /// Input audio file
    input: PathBuf,
    /// Output WAV file
    output: PathBuf,
    /// Shift in semitones (negative lowers)
    #[arg(long, allow_hyphen_values = true)]
    semitones: Option<f32>,
    /// Frequency ratio (2.0 is an octave up)
    #[arg(long)]
    factor: Option<f32>,
    /// Target pitch in Hz
    #[arg(long)]
    target_pitch: Option<f32>,
    /// td_psola, phase_vocoder or wsola
    #[arg(long, value_parser = parse_method)]
    method: Option<ShiftMethod>,
    /// Working sample rate
    #[arg(long)]
    sr: Option<u32>,
}

impl ShiftArgs {
    fn amount(&self) -> Option<ShiftAmount> {
        self.semitones
            .map(ShiftAmount::Semitones)
            .or(self.factor.map(ShiftAmount::Factor))
            .or(self.target_pitch.map(ShiftAmount::TargetHz))
    }
}

fn parse_method(s: &str) -> Result<ShiftMethod, String> {
    s.parse().map_err(|e: repet_dsp::DspError| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Commands::Separate(args) => run_separate(&args, &settings),
        Commands::Shift(args) => run_shift(&args, &settings),
        Commands::Config { init } => run_config(init, &settings),
    }
}

fn run_separate(args: &SeparateArgs, settings: &Settings) -> Result<()> {
    let config = RepetConfig {
        fft_size: args.n_fft.unwrap_or(settings.fft_size),
        hop_length: args.hop_length.unwrap_or(settings.hop_length),
    };

    let (vocal, instrumental) = match (&args.vocal, &args.instrumental) {
        (None, None) => default_stem_paths(&args.input, settings.output_dir.as_deref()),
        (vocal, instrumental) => (vocal.clone(), instrumental.clone()),
    };

    let separation = separate_file(&args.input, vocal.as_deref(), instrumental.as_deref(), config)
        .with_context(|| format!("separating {}", args.input.display()))?;

    info!(
        period_frames = separation.period,
        period_secs = separation.period_secs,
        "repeating period"
    );
    for (label, path) in [("vocal", &vocal), ("instrumental", &instrumental)] {
        if let Some(path) = path {
            println!("{}: {}", label, path.display());
        }
    }
    Ok(())
}

fn run_shift(args: &ShiftArgs, settings: &Settings) -> Result<()> {
    let amount = args
        .amount()
        .context("one of --semitones, --factor or --target-pitch is required")?;
    let method = args.method.unwrap_or(settings.method);
    let sample_rate = args.sr.unwrap_or(settings.sample_rate);

    process_file(&args.input, &args.output, amount, method, Some(sample_rate))
        .with_context(|| format!("shifting {}", args.input.display()))?;

    println!("{}", args.output.display());
    Ok(())
}

fn run_config(init: bool, settings: &Settings) -> Result<()> {
    let path = Settings::config_path();
    if init {
        settings
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "settings written");
    }

    println!("{}", path.display());
    println!("fft_size={}", settings.fft_size);
    println!("hop_length={}", settings.hop_length);
    println!("method={}", settings.method);
    println!("sample_rate={}", settings.sample_rate);
    if let Some(dir) = &settings.output_dir {
        println!("output_dir={}", dir.display());
    }
    Ok(())
}

/// `<stem>_vocal.wav` and `<stem>_instrumental.wav` next to the input, or in
/// `output_dir` when one is configured
fn default_stem_paths(input: &Path, output_dir: Option<&Path>) -> (Option<PathBuf>, Option<PathBuf>) {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    (
        Some(dir.join(format!("{}_vocal.wav", stem))),
        Some(dir.join(format!("{}_instrumental.wav", stem))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("repet").chain(args.iter().copied()))
    }

    fn shift_args(args: &[&str]) -> ShiftArgs {
        match parse(args).unwrap().command {
            Commands::Shift(shift) => shift,
            other => panic!("expected shift, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_semitones_amount() {
        let args = shift_args(&["shift", "in.wav", "out.wav", "--semitones", "-3.5"]);
        assert_eq!(args.amount(), Some(ShiftAmount::Semitones(-3.5)));
        assert_eq!(args.method, None);
    }

    #[test]
    fn test_factor_and_target_amounts() {
        let args = shift_args(&["shift", "in.wav", "out.wav", "--factor", "1.5"]);
        assert_eq!(args.amount(), Some(ShiftAmount::Factor(1.5)));

        let args = shift_args(&["shift", "in.wav", "out.wav", "--target-pitch", "440"]);
        assert_eq!(args.amount(), Some(ShiftAmount::TargetHz(440.0)));
    }

    #[test]
    fn test_amount_is_required_and_exclusive() {
        assert!(parse(&["shift", "in.wav", "out.wav"]).is_err());
        assert!(parse(&["shift", "in.wav", "out.wav", "--semitones", "2", "--factor", "1.2"]).is_err());
    }

    #[test]
    fn test_method_and_rate() {
        let args = shift_args(&[
            "shift", "in.wav", "out.wav", "--semitones", "2", "--method", "TD_PSOLA", "--sr", "16000",
        ]);
        assert_eq!(args.method, Some(ShiftMethod::TdPsola));
        assert_eq!(args.sr, Some(16000));
        assert!(parse(&["shift", "in.wav", "out.wav", "--semitones", "2", "--method", "granular"]).is_err());
    }

    #[test]
    fn test_separate_args() {
        let cli = parse(&[
            "separate", "mix.wav", "--vocal", "v.wav", "--n-fft", "4096", "--hop-length", "1024",
        ])
        .unwrap();
        match cli.command {
            Commands::Separate(args) => {
                assert_eq!(args.input, PathBuf::from("mix.wav"));
                assert_eq!(args.vocal, Some(PathBuf::from("v.wav")));
                assert_eq!(args.instrumental, None);
                assert_eq!(args.n_fft, Some(4096));
                assert_eq!(args.hop_length, Some(1024));
            }
            other => panic!("expected separate, got {:?}", other),
        }
    }

    #[test]
    fn test_default_stem_paths() {
        let (vocal, instrumental) = default_stem_paths(Path::new("songs/mix.flac"), None);
        assert_eq!(vocal, Some(PathBuf::from("songs/mix_vocal.wav")));
        assert_eq!(instrumental, Some(PathBuf::from("songs/mix_instrumental.wav")));

        let (vocal, _) = default_stem_paths(Path::new("mix.flac"), Some(Path::new("/out")));
        assert_eq!(vocal, Some(PathBuf::from("/out/mix_vocal.wav")));
    }
}
