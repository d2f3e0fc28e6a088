//! File I/O and run configuration for IOTA - decoding, WAV output, validation

mod config;
mod loader;
mod writer;

pub use config::{
    loop_grains, ms_to_samples, parse_blocks, parse_effects, Config, ConfigError, ModeName,
    RawConfig, DEFAULT_ATTENUATION_DB, MAX_ATTENUATION_DB, MAX_FILTER_HZ,
};
pub use loader::{bias_zeros, LoadError, SourceAudio, SourceLoader, ZERO_BIAS};
pub use writer::{write_wav, WriteError};
