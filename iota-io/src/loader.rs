//! Source audio loading and decoding

use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Replacement for exact zero samples, one 16-bit step
pub const ZERO_BIAS: f32 = 1.0 / 32767.0;

/// Errors that can occur while loading a source
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unknown sample rate")]
    UnknownSampleRate,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("File contains no samples")]
    Empty,
}

/// A decoded mono source
#[derive(Debug, Clone)]
pub struct SourceAudio {
    /// First channel of the file, zero samples biased to [`ZERO_BIAS`]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the file before the first channel was taken
    pub channels: u16,
}

impl SourceAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Audio file loader using Symphonia
#[derive(Debug, Default)]
pub struct SourceLoader;

impl SourceLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load and decode an audio file, keeping only its first channel
    pub fn load(&self, path: &Path) -> Result<SourceAudio, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

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
            .map_err(|e| LoadError::Decode(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or(LoadError::UnknownSampleRate)?;
        let mut channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    tracing::warn!("Stopped reading {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::debug!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            // Keep the first channel of each interleaved frame
            samples.extend(
                sample_buf
                    .samples()
                    .iter()
                    .step_by(channels.max(1) as usize)
                    .copied(),
            );
        }

        if samples.is_empty() {
            return Err(LoadError::Empty);
        }

        bias_zeros(&mut samples);

        tracing::info!(
            "Loaded {} ({} Hz, {} channel(s), {:.2}s)",
            path.display(),
            sample_rate,
            channels,
            samples.len() as f64 / sample_rate as f64
        );

        Ok(SourceAudio {
            samples,
            sample_rate,
            channels,
        })
    }
}

/// Nudge exact zeros off zero so later peak divisions stay finite
pub fn bias_zeros(samples: &mut [f32]) {
    for s in samples.iter_mut().filter(|s| **s == 0.0) {
        *s = ZERO_BIAS;
    }
}
