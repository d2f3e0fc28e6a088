//! Grain streams - sequences of grains rendered to stereo

use crate::effects::{Convolver, FilterCache, FilterError, GrainEffect};
use crate::grain::{Grain, GRAIN_TAPER};
use crate::stats::RunStats;
use iota_analysis::{peak, tukey};
use rand::Rng;
use rand_distr::StandardNormal;
use thiserror::Error;

/// Standard deviation of the per-grain pan position
pub const PAN_SPREAD: f32 = 0.4;

/// Errors that can occur while extending a stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("grain stream is full ({0} grains)")]
    Full(usize),
    #[error("grain has {actual} samples, stream expects {expected}")]
    GrainSize { expected: usize, actual: usize },
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),
}

/// Two equal-length channels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Silent buffer of `len` frames
    pub fn new(len: usize) -> Self {
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
        }
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Peak absolute sample across both channels
    pub fn peak(&self) -> f32 {
        peak(&self.left).max(peak(&self.right))
    }

    /// Multiply both channels by `gain`
    pub fn scale(&mut self, gain: f32) {
        for s in self.left.iter_mut().chain(self.right.iter_mut()) {
            *s *= gain;
        }
    }
}

/// Shared resources a stream worker needs while extending streams
pub struct StreamContext<'a> {
    pub filters: &'a FilterCache,
    pub stats: &'a RunStats,
    pub convolver: Convolver,
}

impl<'a> StreamContext<'a> {
    pub fn new(filters: &'a FilterCache, stats: &'a RunStats) -> Self {
        Self {
            filters,
            stats,
            convolver: Convolver::new(),
        }
    }
}

/// A fixed number of grain slots filled one after another.
///
/// The stream is complete once every slot holds a grain. A convolution effect
/// couples each grain to the audio already written in the slot before it.
pub struct GrainStream {
    audio: Vec<f32>,
    num_grains: usize,
    next_grain: usize,
    offset: usize,
    grain_size: usize,
    grain_window: Vec<f32>,
}

impl GrainStream {
    pub fn new(offset: usize, grain_size: usize, num_grains: usize) -> Self {
        Self {
            audio: vec![0.0; num_grains * grain_size],
            num_grains,
            next_grain: 0,
            offset,
            grain_size,
            grain_window: tukey(grain_size, GRAIN_TAPER),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn grain_size(&self) -> usize {
        self.grain_size
    }

    pub fn num_grains(&self) -> usize {
        self.num_grains
    }

    pub fn slots_filled(&self) -> usize {
        self.next_grain
    }

    pub fn is_full(&self) -> bool {
        self.next_grain == self.num_grains
    }

    /// Audio written to slot `index`, if it has been filled
    pub fn slot(&self, index: usize) -> Option<&[f32]> {
        if index >= self.next_grain {
            return None;
        }
        let start = index * self.grain_size;
        Some(&self.audio[start..start + self.grain_size])
    }

    /// Audio of the most recently filled slot
    pub fn previous_slot(&self) -> Option<&[f32]> {
        self.next_grain.checked_sub(1).and_then(|i| self.slot(i))
    }

    /// Apply `effects` to a copy of `grain` and write it into the next slot
    pub fn extend(
        &mut self,
        grain: &Grain,
        effects: &[GrainEffect],
        ctx: &mut StreamContext<'_>,
    ) -> Result<(), StreamError> {
        if self.is_full() {
            return Err(StreamError::Full(self.num_grains));
        }
        if grain.len() != self.grain_size {
            return Err(StreamError::GrainSize {
                expected: self.grain_size,
                actual: grain.len(),
            });
        }

        let mut scratch = grain.audio().to_vec();
        for effect in effects {
            match effect {
                GrainEffect::Filter(params) => {
                    scratch = ctx.filters.apply(&scratch, params, &mut ctx.convolver)?;
                    ctx.stats.record_filtering();
                }
                GrainEffect::Convolve => {
                    // Nothing to convolve with in the first slot
                    if let Some(previous) = self.previous_slot() {
                        scratch = self.convolve_with(&scratch, previous, &mut ctx.convolver);
                        ctx.stats.record_convolution();
                    }
                }
            }
        }

        let start = self.next_grain * self.grain_size;
        self.audio[start..start + self.grain_size].copy_from_slice(&scratch);
        self.next_grain += 1;
        ctx.stats.record_grain();
        Ok(())
    }

    /// Convolve with the previous slot, restore the original peak and re-window
    fn convolve_with(&self, audio: &[f32], previous: &[f32], convolver: &mut Convolver) -> Vec<f32> {
        let original_peak = peak(audio);
        let mut convolved = convolver.same(audio, previous);
        convolved.truncate(self.grain_size);

        let convolved_peak = peak(&convolved);
        let gain = if convolved_peak > 0.0 {
            original_peak / convolved_peak
        } else {
            0.0
        };

        convolved
            .iter()
            .zip(&self.grain_window)
            .map(|(s, w)| s * gain * w)
            .collect()
    }

    /// Total output length: every slot plus one grain of padding
    pub fn total_len(&self) -> usize {
        self.audio.len() + self.grain_size
    }

    /// Pan every grain randomly and pad the result by the stream offset.
    ///
    /// Each grain gets a pan position drawn from a normal distribution; the
    /// output is delayed by `offset` samples and padded to [`total_len`].
    ///
    /// [`total_len`]: GrainStream::total_len
    pub fn stereo_audio<R: Rng + ?Sized>(&self, rng: &mut R) -> StereoBuffer {
        let mut out = StereoBuffer::new(self.total_len());
        if self.grain_size == 0 {
            return out;
        }

        for (index, grain) in self.audio.chunks(self.grain_size).enumerate() {
            let pan = rng.sample::<f32, _>(StandardNormal) * PAN_SPREAD;
            let left_gain = (1.0 - pan).clamp(0.0, 1.0);
            let right_gain = (1.0 + pan).clamp(0.0, 1.0);

            let start = self.offset + index * self.grain_size;
            for (i, &s) in grain.iter().enumerate() {
                out.left[start + i] = s * left_gain;
                out.right[start + i] = s * right_gain;
            }
        }

        out
    }
}
