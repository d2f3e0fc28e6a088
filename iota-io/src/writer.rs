//! Stereo 16-bit WAV output

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("interleaved stereo needs an even sample count, got {0}")]
    OddSampleCount(usize),
}

/// Write interleaved stereo frames as 16-bit PCM
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<(), WriteError> {
    if samples.len() % 2 != 0 {
        return Err(WriteError::OddSampleCount(samples.len()));
    }

    tracing::info!("Writing to {}", path.display());
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}
