//! Grains, grain groups and the grouping of a source into them

use iota_analysis::{
    extract_features, kmeans, select_events, tukey, AnalysisError, FeatureMatrix,
    KMEANS_ITERATIONS,
};
use rand::Rng;

/// Taper fraction of the window applied to every extracted grain
pub const GRAIN_TAPER: f32 = 0.1;

/// Sample value used for silent placeholder grains (kept off exact zero)
const SILENT_LEVEL: f32 = 1e-7;

/// A fixed-length windowed snippet of the source plus its feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Grain {
    audio: Vec<f32>,
    features: Vec<f32>,
}

impl Grain {
    pub fn new(audio: Vec<f32>, features: Vec<f32>) -> Self {
        Self { audio, features }
    }

    /// Near-silent placeholder with no features
    pub fn silent(grain_size: usize) -> Self {
        Self {
            audio: vec![SILENT_LEVEL; grain_size],
            features: Vec::new(),
        }
    }

    pub fn audio(&self) -> &[f32] {
        &self.audio
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

/// Unordered bag of grains sharing a cluster label
#[derive(Debug, Clone, Default)]
pub struct GrainGroup {
    grains: Vec<Grain>,
}

impl GrainGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_grain(&mut self, grain: Grain) {
        self.grains.push(grain);
    }

    /// Uniformly random member, `None` for an empty group
    pub fn random_grain<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Grain> {
        if self.grains.is_empty() {
            return None;
        }
        Some(&self.grains[rng.gen_range(0..self.grains.len())])
    }

    pub fn len(&self) -> usize {
        self.grains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grain> {
        self.grains.iter()
    }
}

/// Settings for splitting a source into grain groups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingParams {
    pub grain_size: usize,
    pub grain_spacing: usize,
    pub num_groups: usize,
    pub num_features: usize,
    pub zero_crossings: bool,
}

/// A source split into clustered grain groups
#[derive(Debug, Clone)]
pub struct GroupedSource {
    /// One group per cluster
    pub groups: Vec<GrainGroup>,
    /// Event offsets into the source
    pub events: Vec<usize>,
    /// Cluster label per event
    pub labels: Vec<usize>,
    /// Feature matrix (features x events)
    pub features: FeatureMatrix,
}

impl GroupedSource {
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }
}

/// Select events, describe them, cluster them and cut one grain per event
pub fn group_events<R: Rng + ?Sized>(
    audio: &[f32],
    sample_rate: u32,
    params: &GroupingParams,
    rng: &mut R,
) -> Result<GroupedSource, AnalysisError> {
    let events = select_events(audio.len(), params.grain_spacing, params.grain_size);
    if events.is_empty() {
        return Err(AnalysisError::NoEvents {
            len: audio.len(),
            gap: params.grain_spacing.max(params.grain_size),
        });
    }

    let features = extract_features(
        audio,
        &events,
        params.grain_spacing,
        sample_rate,
        params.num_features,
        params.zero_crossings,
        rng,
    )?;

    tracing::info!("Clustering {} events into {} groups", events.len(), params.num_groups);
    let clustering = kmeans(&features.points(), params.num_groups, KMEANS_ITERATIONS, rng)?;

    let window = tukey(params.grain_size, GRAIN_TAPER);
    let mut groups = vec![GrainGroup::new(); params.num_groups];
    for (i, (&event, &label)) in events.iter().zip(&clustering.labels).enumerate() {
        let audio = audio[event..event + params.grain_size]
            .iter()
            .zip(&window)
            .map(|(s, w)| s * w)
            .collect();
        groups[label].add_grain(Grain::new(audio, features.column(i)));
    }

    tracing::debug!(
        "Group sizes: {:?}",
        groups.iter().map(GrainGroup::len).collect::<Vec<_>>()
    );

    Ok(GroupedSource {
        groups,
        events,
        labels: clustering.labels,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f32::consts::PI;

    fn two_tone_source() -> Vec<f32> {
        (0..44100)
            .map(|i| {
                let f = if i < 22050 { 300.0 } else { 5000.0 };
                (2.0 * PI * f * i as f32 / 44100.0 + 0.1).sin() * 0.5
            })
            .collect()
    }

    fn params(num_groups: usize) -> GroupingParams {
        GroupingParams {
            grain_size: 441,
            grain_spacing: 2205,
            num_groups,
            num_features: 4,
            zero_crossings: true,
        }
    }

    #[test]
    fn test_random_grain_empty_group() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(GrainGroup::new().random_grain(&mut rng).is_none());
    }

    #[test]
    fn test_random_grain_uniform_membership() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut group = GrainGroup::new();
        group.add_grain(Grain::new(vec![1.0], vec![]));
        group.add_grain(Grain::new(vec![2.0], vec![]));
        let picks: Vec<f32> = (0..100)
            .map(|_| group.random_grain(&mut rng).unwrap().audio()[0])
            .collect();
        assert!(picks.contains(&1.0));
        assert!(picks.contains(&2.0));
    }

    #[test]
    fn test_groups_partition_events() {
        let mut rng = StdRng::seed_from_u64(3);
        let source = two_tone_source();
        let grouped = group_events(&source, 44100, &params(3), &mut rng).unwrap();

        assert_eq!(grouped.num_groups(), 3);
        assert_eq!(grouped.events.len(), 20);
        assert_eq!(grouped.labels.len(), grouped.events.len());
        let total: usize = grouped.groups.iter().map(GrainGroup::len).sum();
        assert_eq!(total, grouped.events.len());

        for group in &grouped.groups {
            for grain in group.iter() {
                assert_eq!(grain.len(), 441);
                assert_eq!(grain.features().len(), 4);
                // Tapered edges
                assert!(grain.audio()[0].abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_two_tones_split() {
        let mut rng = StdRng::seed_from_u64(3);
        let source = two_tone_source();
        let grouped = group_events(&source, 44100, &params(2), &mut rng).unwrap();

        // The zero-crossing feature alone separates the halves
        let first = grouped.labels[0];
        assert!(grouped.labels[..10].iter().all(|&l| l == first));
        assert!(grouped.labels[10..].iter().all(|&l| l != first));
    }

    #[test]
    fn test_source_too_short() {
        let mut rng = StdRng::seed_from_u64(3);
        let result = group_events(&[0.1; 100], 44100, &params(2), &mut rng);
        assert!(matches!(result, Err(AnalysisError::NoEvents { .. })));
    }
}
