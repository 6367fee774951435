//! File handling for REPET - decoding, WAV output, settings and
//! file-to-file conveniences

mod config;
mod loader;
mod process;
mod writer;

pub use config::Settings;
pub use loader::{downmix, resample, AudioLoader, LoadError, LoadedAudio};
pub use process::{process_file, separate_file, ProcessError};
pub use writer::{save_wav, SaveError};
