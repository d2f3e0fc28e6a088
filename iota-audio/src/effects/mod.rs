//! Grain effects for IOTA
//!
//! Effects are declared up front as [`EffectSpec`]s. The [`EffectsManager`]
//! decides, grain by grain, which of them fire.

mod convolve;
mod filter;

pub use convolve::Convolver;
pub use filter::{
    design_kernel, kaiser_order, FilterCache, FilterError, FilterMode, FilterParams,
    MIN_ATTENUATION_DB,
};

use crate::grain::Grain;
use iota_analysis::FeatureMatrix;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// What an effect does once it fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectKind {
    /// FIR low-pass or high-pass filter
    Filter(FilterParams),
    /// Convolve the grain with the previous grain in its stream
    Convolve,
}

/// A user-declared effect.
///
/// Effects sharing an `identifier` share one feature row and one firing
/// distribution; `strength` (in `(0, 1]`) is the fraction of that row's top
/// values that make up the distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSpec {
    pub kind: EffectKind,
    pub identifier: String,
    pub strength: f32,
}

/// An effect that fired for a particular grain
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrainEffect {
    Filter(FilterParams),
    Convolve,
}

/// Errors raised while setting up effects
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectsError {
    #[error("{identifiers} effect identifiers need as many feature rows, only {features} available")]
    TooManyIdentifiers { identifiers: usize, features: usize },
}

/// Per-identifier firing state
#[derive(Debug, Clone)]
struct IdentifierDistribution {
    identifier: String,
    /// Feature row this identifier listens to
    feature: usize,
    /// Top `strength` fraction of that row, ascending
    tail: Vec<f32>,
}

/// Decides which effects fire for each grain.
///
/// Each distinct identifier is bound to a feature row through a random
/// permutation. For every grain and every spec, a threshold is drawn from the
/// identifier's tail distribution and the effect fires when the grain's value
/// on that row reaches it. The same grain can therefore fire on one draw and
/// not on the next.
#[derive(Debug, Clone)]
pub struct EffectsManager {
    specs: Vec<EffectSpec>,
    distributions: Vec<IdentifierDistribution>,
    /// Index into `distributions` for each spec
    spec_slots: Vec<usize>,
}

impl EffectsManager {
    pub fn new<R: Rng + ?Sized>(
        specs: Vec<EffectSpec>,
        features: &FeatureMatrix,
        rng: &mut R,
    ) -> Result<Self, EffectsError> {
        let mut rows: Vec<usize> = (0..features.num_features()).collect();
        rows.shuffle(rng);

        let mut distributions: Vec<IdentifierDistribution> = Vec::new();
        let mut spec_slots = Vec::with_capacity(specs.len());

        for spec in &specs {
            if let Some(slot) = distributions
                .iter()
                .position(|d| d.identifier == spec.identifier)
            {
                spec_slots.push(slot);
                continue;
            }

            let slot = distributions.len();
            let feature = *rows.get(slot).ok_or(EffectsError::TooManyIdentifiers {
                identifiers: count_identifiers(&specs),
                features: features.num_features(),
            })?;

            distributions.push(IdentifierDistribution {
                identifier: spec.identifier.clone(),
                feature,
                tail: tail_distribution(features.row(feature), spec.strength),
            });
            spec_slots.push(slot);
        }

        Ok(Self {
            specs,
            distributions,
            spec_slots,
        })
    }

    /// Feature row bound to `identifier`
    pub fn feature_for(&self, identifier: &str) -> Option<usize> {
        self.distributions
            .iter()
            .find(|d| d.identifier == identifier)
            .map(|d| d.feature)
    }

    /// Tail distribution bound to `identifier`
    pub fn tail_for(&self, identifier: &str) -> Option<&[f32]> {
        self.distributions
            .iter()
            .find(|d| d.identifier == identifier)
            .map(|d| d.tail.as_slice())
    }

    /// Effects that fire for `grain`, in spec order
    pub fn grain_fx<R: Rng + ?Sized>(&self, grain: &Grain, rng: &mut R) -> Vec<GrainEffect> {
        self.specs
            .iter()
            .zip(&self.spec_slots)
            .filter_map(|(spec, &slot)| {
                let dist = &self.distributions[slot];
                let threshold = *dist.tail.choose(rng)?;
                let value = *grain.features().get(dist.feature)?;
                if value < threshold {
                    return None;
                }
                Some(match spec.kind {
                    EffectKind::Filter(params) => GrainEffect::Filter(params),
                    EffectKind::Convolve => GrainEffect::Convolve,
                })
            })
            .collect()
    }
}

/// Sorted top fraction of a feature row.
///
/// Keeps everything from index `int(len - len * strength)` onwards.
fn tail_distribution(row: &[f32], strength: f32) -> Vec<f32> {
    let mut sorted = row.to_vec();
    sorted.sort_by(f32::total_cmp);
    let len = sorted.len() as f32;
    let start = ((len - len * strength) as usize).min(sorted.len());
    sorted.split_off(start)
}

fn count_identifiers(specs: &[EffectSpec]) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for spec in specs {
        if !seen.contains(&spec.identifier.as_str()) {
            seen.push(&spec.identifier);
        }
    }
    seen.len()
}
