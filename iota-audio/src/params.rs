//! Resolved synthesis parameters (all lengths in samples)

use crate::effects::EffectSpec;
use crate::generator::GeneratorMode;
use crate::grain::GroupingParams;
use crate::mastering::MasteringParams;

#[derive(Debug, Clone, PartialEq)]
pub struct SynthParams {
    pub grain_size: usize,
    pub grain_spacing: usize,
    pub num_streams: usize,
    pub num_groups: usize,
    pub num_features: usize,
    pub zero_crossings: bool,
    pub mode: GeneratorMode,
    pub effects: Vec<EffectSpec>,
    pub mastering: MasteringParams,
    /// Worker threads used for stream generation
    pub threads: usize,
}

impl SynthParams {
    pub fn grouping(&self) -> GroupingParams {
        GroupingParams {
            grain_size: self.grain_size,
            grain_spacing: self.grain_spacing,
            num_groups: self.num_groups,
            num_features: self.num_features,
            zero_crossings: self.zero_crossings,
        }
    }

    /// Start offset of stream `index`, spreading streams evenly over one grain
    pub fn stream_offset(&self, index: usize) -> usize {
        if self.num_streams == 0 {
            return 0;
        }
        (self.grain_size / self.num_streams) * index
    }
}
