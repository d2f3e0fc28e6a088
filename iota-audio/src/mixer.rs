//! Mixdown - summing rendered streams into one stereo buffer

use crate::error::SynthError;
use crate::stream::StereoBuffer;

/// Running channel-by-channel sum of rendered streams.
///
/// Streams are added one at a time so only the mix itself stays resident.
/// Every stream must match the length of the first; streams are built with
/// equal slot counts and grain sizes so this holds by construction.
#[derive(Debug, Default)]
pub struct MixBus {
    mix: Option<StereoBuffer>,
    streams: usize,
}

impl MixBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of streams summed so far
    pub fn streams(&self) -> usize {
        self.streams
    }

    pub fn add(&mut self, stream: &StereoBuffer) -> Result<(), SynthError> {
        let index = self.streams;
        let mix = self
            .mix
            .get_or_insert_with(|| StereoBuffer::new(stream.len()));
        let len = mix.len();
        if stream.len() != len || stream.right.len() != len {
            return Err(SynthError::LengthMismatch {
                index,
                expected: len,
                actual: stream.len().min(stream.right.len()),
            });
        }

        for (out, s) in mix.left.iter_mut().zip(&stream.left) {
            *out += s;
        }
        for (out, s) in mix.right.iter_mut().zip(&stream.right) {
            *out += s;
        }
        self.streams += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<StereoBuffer, SynthError> {
        let mix = self.mix.ok_or(SynthError::NoStreams)?;
        tracing::debug!("Mixed {} streams into {} frames", self.streams, mix.len());
        Ok(mix)
    }
}

/// Sum all streams channel by channel, in order
pub fn mixdown(streams: &[StereoBuffer]) -> Result<StereoBuffer, SynthError> {
    let mut bus = MixBus::new();
    for stream in streams {
        bus.add(stream)?;
    }
    bus.finish()
}
