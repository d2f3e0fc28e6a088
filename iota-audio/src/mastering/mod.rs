//! Post-processing chain for the mixed streams
//!
//! Signal flow:
//! ```text
//! Streams → Mixdown → Compressor → Normalise → Fade → 16-bit interleave
//! ```

mod compressor;

pub use compressor::{CompressionReport, WindowCompressor, COMPRESSOR_WINDOW};

use crate::stream::StereoBuffer;
use iota_analysis::tukey;

/// One in-place stage of the mastering chain
pub trait MasteringStage: Send {
    fn process(&mut self, buffer: &mut StereoBuffer);

    fn name(&self) -> &'static str;
}

/// Settings for the whole chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteringParams {
    /// Fraction of compressor windows above the knee
    pub comp_thresh: f32,
    pub comp_ratio: f32,
    /// Peak level after normalisation
    pub norm_level: f32,
    /// Tukey shape of the fade over the whole output
    pub fade_size: f32,
}

impl Default for MasteringParams {
    fn default() -> Self {
        Self {
            comp_thresh: 0.2,
            comp_ratio: 2.5,
            norm_level: 0.9,
            fade_size: 0.05,
        }
    }
}

/// Scales both channels together so the peak touches `level`
pub struct StereoNormaliser {
    level: f32,
}

impl StereoNormaliser {
    pub fn new(level: f32) -> Self {
        Self { level }
    }
}

impl MasteringStage for StereoNormaliser {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let peak = buffer.peak();
        tracing::debug!("Peak level is {:.4}, normalising to {:.2}", peak, self.level);
        if peak > 0.0 {
            buffer.scale(self.level / peak);
        }
    }

    fn name(&self) -> &'static str {
        "normalise"
    }
}

/// Tukey fade over the entire buffer
pub struct Fade {
    alpha: f32,
}

impl Fade {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }
}

impl MasteringStage for Fade {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let window = tukey(buffer.len(), self.alpha);
        for ((l, r), w) in buffer.left.iter_mut().zip(buffer.right.iter_mut()).zip(window) {
            *l *= w;
            *r *= w;
        }
    }

    fn name(&self) -> &'static str {
        "fade"
    }
}

/// Compressor, normaliser and fade in signal flow order
pub struct MasteringChain {
    stages: Vec<Box<dyn MasteringStage>>,
}

impl MasteringChain {
    pub fn new(params: &MasteringParams) -> Self {
        Self {
            stages: vec![
                Box::new(WindowCompressor::new(params.comp_thresh, params.comp_ratio)),
                Box::new(StereoNormaliser::new(params.norm_level)),
                Box::new(Fade::new(params.fade_size)),
            ],
        }
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for stage in &mut self.stages {
            tracing::trace!("Mastering stage: {}", stage.name());
            stage.process(buffer);
        }
    }
}

/// Interleave into 16-bit frames.
///
/// Samples are scaled by 32767 and truncated towards zero.
pub fn quantize(buffer: &StereoBuffer) -> Vec<i16> {
    buffer
        .left
        .iter()
        .zip(&buffer.right)
        .flat_map(|(&l, &r)| [to_i16(l), to_i16(r)])
        .collect()
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    // `as` saturates out-of-range floats
    (sample * 32767.0) as i16
}

/// Master and quantize the mixed streams
pub fn post_process(mut mixed: StereoBuffer, params: &MasteringParams) -> Vec<i16> {
    MasteringChain::new(params).process(&mut mixed);
    quantize(&mixed)
}
