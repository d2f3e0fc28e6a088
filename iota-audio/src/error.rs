//! Errors raised by the synthesis engine

use crate::effects::EffectsError;
use crate::stream::StreamError;
use iota_analysis::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Effects(#[from] EffectsError),
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    #[error("{identifiers} block identifiers need at least as many groups, only {groups} available")]
    TooFewGroups { groups: usize, identifiers: usize },
    #[error("nothing to mix: no streams were generated")]
    NoStreams,
    #[error("stream {index} has {actual} frames, expected {expected}")]
    LengthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("stream worker panicked")]
    WorkerPanicked,
}
