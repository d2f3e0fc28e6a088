//! Granular synthesis engine for IOTA
//!
//! This crate turns a clustered source into a stereo rendering:
//! - Grain: windowed source snippets and the groups they cluster into
//! - Effects: FIR filters, grain-to-grain convolution and the manager that
//!   decides when they fire
//! - Stream: fixed-length sequences of grains, panned and offset
//! - Generator: loop and block strategies for choosing groups per slot
//! - Mastering: mixdown, compression, normalisation, fade and quantisation
//! - Engine: the [`Synthesizer`] running a whole batch across worker threads

mod effects;
mod engine;
mod error;
mod generator;
mod grain;
mod mastering;
mod mixer;
mod params;
mod stats;
mod stream;

pub use effects::{
    design_kernel, kaiser_order, Convolver, EffectKind, EffectSpec, EffectsError, EffectsManager,
    FilterCache, FilterError, FilterMode, FilterParams, GrainEffect, MIN_ATTENUATION_DB,
};
pub use engine::{Rendering, Synthesizer};
pub use error::SynthError;
pub use generator::{Block, BlockGenerator, GeneratorMode, GrainPool, GroupLoop, StreamGenerator};
pub use grain::{group_events, Grain, GrainGroup, GroupedSource, GroupingParams, GRAIN_TAPER};
pub use mastering::{
    post_process, quantize, CompressionReport, Fade, MasteringChain, MasteringParams,
    MasteringStage, StereoNormaliser, WindowCompressor, COMPRESSOR_WINDOW,
};
pub use mixer::{mixdown, MixBus};
pub use params::SynthParams;
pub use stats::{RunStats, StatsSnapshot};
pub use stream::{GrainStream, StereoBuffer, StreamContext, StreamError, PAN_SPREAD};
