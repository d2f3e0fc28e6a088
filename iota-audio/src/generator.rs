//! Stream generators - decide which group feeds each grain slot
//!
//! Two strategies are available:
//! - [`GroupLoop`]: cycles through every group, drifting towards the next
//!   group as each group's run of slots progresses
//! - [`BlockGenerator`]: follows user-drawn time blocks per identifier, with
//!   a baseline chance of silence

use crate::effects::EffectsManager;
use crate::error::SynthError;
use crate::grain::{Grain, GrainGroup};
use crate::stream::{GrainStream, StreamContext};
use iota_analysis::tukey;
use rand::{Rng, RngCore};

/// A time window during which one identifier's group is likely to play
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub identifier: String,
    /// First grain slot (inclusive)
    pub start: usize,
    /// Last grain slot (exclusive)
    pub end: usize,
    /// Tukey shape of the block's probability envelope
    pub alpha: f32,
}

/// Generation strategy with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorMode {
    Loop {
        repeats: usize,
        grains_per_group: usize,
    },
    Block {
        blocks: Vec<Block>,
        emptiness: f32,
    },
}

impl GeneratorMode {
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorMode::Loop { .. } => "loop",
            GeneratorMode::Block { .. } => "block",
        }
    }
}

/// Read-only grain material shared by every stream worker
pub struct GrainPool<'a> {
    groups: &'a [GrainGroup],
    effects: Option<&'a EffectsManager>,
    silent: Grain,
}

impl<'a> GrainPool<'a> {
    pub fn new(
        groups: &'a [GrainGroup],
        effects: Option<&'a EffectsManager>,
        grain_size: usize,
    ) -> Self {
        Self {
            groups,
            effects,
            silent: Grain::silent(grain_size),
        }
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Append a random grain from `group`, with whatever effects fire for it
    pub fn extend_from_group(
        &self,
        stream: &mut GrainStream,
        group: usize,
        ctx: &mut StreamContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<(), SynthError> {
        let Some(grain) = self.groups.get(group).and_then(|g| g.random_grain(rng)) else {
            tracing::trace!("Group {} is empty, inserting silence", group);
            return self.extend_silent(stream, ctx);
        };

        let effects = match self.effects {
            Some(manager) => manager.grain_fx(grain, rng),
            None => Vec::new(),
        };
        stream.extend(grain, &effects, ctx)?;
        Ok(())
    }

    /// Append a near-silent placeholder grain
    pub fn extend_silent(
        &self,
        stream: &mut GrainStream,
        ctx: &mut StreamContext<'_>,
    ) -> Result<(), SynthError> {
        stream.extend(&self.silent, &[], ctx)?;
        Ok(())
    }
}

/// Fills a grain stream slot by slot
pub trait StreamGenerator: Send + Sync {
    /// Number of slots every stream gets
    fn num_grains(&self) -> usize;

    /// Fill every slot of `stream`
    fn fill(
        &self,
        stream: &mut GrainStream,
        pool: &GrainPool<'_>,
        ctx: &mut StreamContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<(), SynthError>;
}

/// Cycle through all groups `repeats` times.
///
/// Each group gets `grains_per_group` slots. In slot `i` a uniform draw from
/// `[0, grains_per_group)` that is `<= i` switches to the next group, so the
/// hand-over becomes more likely as the run goes on and certain in its last
/// slot.
#[derive(Debug, Clone)]
pub struct GroupLoop {
    repeats: usize,
    grains_per_group: usize,
    num_groups: usize,
}

impl GroupLoop {
    pub fn new(repeats: usize, grains_per_group: usize, num_groups: usize) -> Self {
        Self {
            repeats,
            grains_per_group,
            num_groups,
        }
    }

    fn group_for<R: Rng + ?Sized>(&self, cycle: usize, slot: usize, rng: &mut R) -> usize {
        if rng.gen_range(0..self.grains_per_group) <= slot {
            (cycle + 1) % self.num_groups
        } else {
            cycle % self.num_groups
        }
    }
}

impl StreamGenerator for GroupLoop {
    fn num_grains(&self) -> usize {
        self.grains_per_group * self.num_groups * self.repeats
    }

    fn fill(
        &self,
        stream: &mut GrainStream,
        pool: &GrainPool<'_>,
        ctx: &mut StreamContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<(), SynthError> {
        if self.num_groups == 0 {
            return Ok(());
        }
        for cycle in 0..self.num_groups * self.repeats {
            for slot in 0..self.grains_per_group {
                let group = self.group_for(cycle, slot, rng);
                pool.extend_from_group(stream, group, ctx, rng)?;
            }
        }
        Ok(())
    }
}

/// Pick groups from per-identifier probability envelopes.
///
/// Row `k < identifiers` of the distribution holds the summed Tukey envelopes
/// of identifier `k`'s blocks; the final row is the constant emptiness level.
#[derive(Debug, Clone)]
pub struct BlockGenerator {
    identifiers: Vec<String>,
    /// `(identifiers + 1) x num_grains`
    distribution: Vec<Vec<f32>>,
    num_grains: usize,
}

impl BlockGenerator {
    /// Build the distribution. Identifiers map to groups in first-seen order.
    pub fn new(blocks: &[Block], emptiness: f32, num_groups: usize) -> Result<Self, SynthError> {
        let mut identifiers: Vec<String> = Vec::new();
        for block in blocks {
            if !identifiers.contains(&block.identifier) {
                identifiers.push(block.identifier.clone());
            }
        }
        if identifiers.len() > num_groups {
            return Err(SynthError::TooFewGroups {
                groups: num_groups,
                identifiers: identifiers.len(),
            });
        }

        let num_grains = blocks.iter().map(|b| b.end).max().unwrap_or(0);
        let mut distribution = vec![vec![0.0f32; num_grains]; identifiers.len() + 1];

        for block in blocks {
            let Some(row) = identifiers.iter().position(|id| *id == block.identifier) else {
                continue;
            };
            let start = block.start.min(block.end);
            let envelope = tukey(block.end - start, block.alpha);
            for (cell, w) in distribution[row][start..block.end].iter_mut().zip(envelope) {
                *cell += w;
            }
        }
        if let Some(empty_row) = distribution.last_mut() {
            empty_row.fill(emptiness);
        }

        Ok(Self {
            identifiers,
            distribution,
            num_grains,
        })
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Probability envelope of row `index` (the last row is emptiness)
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.distribution.get(index).map(Vec::as_slice)
    }

    /// Row winning slot `slot`, `None` when the slot stays silent
    fn choose_row<R: Rng + ?Sized>(&self, slot: usize, rng: &mut R) -> Option<usize> {
        let mut best = 0.0f32;
        let mut best_row = None;
        for (k, row) in self.distribution.iter().enumerate() {
            let r = rng.gen::<f32>() * row[slot];
            if r > best {
                best = r;
                best_row = Some(k);
            }
        }
        best_row.filter(|&k| k < self.identifiers.len())
    }
}

impl StreamGenerator for BlockGenerator {
    fn num_grains(&self) -> usize {
        self.num_grains
    }

    fn fill(
        &self,
        stream: &mut GrainStream,
        pool: &GrainPool<'_>,
        ctx: &mut StreamContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<(), SynthError> {
        for slot in 0..self.num_grains {
            match self.choose_row(slot, rng) {
                Some(group) => pool.extend_from_group(stream, group, ctx, rng)?,
                None => pool.extend_silent(stream, ctx)?,
            }
        }
        Ok(())
    }
}
