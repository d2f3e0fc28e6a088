//! Synthesis engine - runs analysis, stream generation and mastering

use crate::effects::{EffectsManager, FilterCache};
use crate::error::SynthError;
use crate::generator::{BlockGenerator, GeneratorMode, GrainPool, GroupLoop, StreamGenerator};
use crate::grain::group_events;
use crate::mastering::post_process;
use crate::mixer::MixBus;
use crate::params::SynthParams;
use crate::stats::RunStats;
use crate::stream::{GrainStream, StereoBuffer, StreamContext};
use crossbeam_channel::{unbounded, Receiver};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

type StreamResult = (usize, Result<StereoBuffer, SynthError>);

/// Finished output of one run
#[derive(Debug, Clone)]
pub struct Rendering {
    /// Interleaved stereo 16-bit samples
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub num_streams: usize,
    /// Grains in each group after clustering
    pub group_sizes: Vec<usize>,
}

impl Rendering {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Shared, read-only state for the stream workers
struct StreamJob<'a> {
    params: &'a SynthParams,
    generator: &'a dyn StreamGenerator,
    pool: &'a GrainPool<'a>,
    filters: &'a FilterCache,
    stats: &'a RunStats,
}

impl StreamJob<'_> {
    fn render(&self, index: usize, seed: u64) -> Result<StereoBuffer, SynthError> {
        tracing::info!(
            "Generating grain stream {}/{}",
            index + 1,
            self.params.num_streams
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut stream = GrainStream::new(
            self.params.stream_offset(index),
            self.params.grain_size,
            self.generator.num_grains(),
        );
        let mut ctx = StreamContext::new(self.filters, self.stats);
        self.generator.fill(&mut stream, self.pool, &mut ctx, &mut rng)?;
        Ok(stream.stereo_audio(&mut rng))
    }
}

/// Runs a whole synthesis batch.
///
/// The master random generator is consumed in a fixed order (feature bins,
/// cluster initialisation, effect rows, then one seed per stream), so a
/// seeded run gives the same output whatever the thread count.
pub struct Synthesizer {
    params: SynthParams,
}

impl Synthesizer {
    pub fn new(params: SynthParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SynthParams {
        &self.params
    }

    pub fn run(
        &self,
        source: &[f32],
        sample_rate: u32,
        rng: &mut StdRng,
        stats: &RunStats,
    ) -> Result<Rendering, SynthError> {
        let grouped = group_events(source, sample_rate, &self.params.grouping(), rng)?;
        stats.record_events(grouped.events.len());

        let effects = if self.params.effects.is_empty() {
            None
        } else {
            Some(EffectsManager::new(
                self.params.effects.clone(),
                &grouped.features,
                rng,
            )?)
        };

        let generator: Box<dyn StreamGenerator> = match &self.params.mode {
            GeneratorMode::Loop {
                repeats,
                grains_per_group,
            } => Box::new(GroupLoop::new(
                *repeats,
                *grains_per_group,
                grouped.num_groups(),
            )),
            GeneratorMode::Block { blocks, emptiness } => Box::new(BlockGenerator::new(
                blocks,
                *emptiness,
                grouped.num_groups(),
            )?),
        };
        tracing::debug!(
            "{} mode: {} grains per stream",
            self.params.mode.name(),
            generator.num_grains()
        );

        let seeds: Vec<u64> = (0..self.params.num_streams).map(|_| rng.gen()).collect();
        let filters = FilterCache::new(sample_rate);
        let pool = GrainPool::new(&grouped.groups, effects.as_ref(), self.params.grain_size);
        let job = StreamJob {
            params: &self.params,
            generator: generator.as_ref(),
            pool: &pool,
            filters: &filters,
            stats,
        };

        let mixed = self.render_parallel(&job, &seeds)?;
        tracing::debug!("{} filter kernels designed", filters.len());

        let samples = post_process(mixed, &self.params.mastering);
        Ok(Rendering {
            samples,
            sample_rate,
            num_streams: seeds.len(),
            group_sizes: grouped.groups.iter().map(|g| g.len()).collect(),
        })
    }

    /// Render every stream on a pool of scoped worker threads and mix them
    fn render_parallel(
        &self,
        job: &StreamJob<'_>,
        seeds: &[u64],
    ) -> Result<StereoBuffer, SynthError> {
        if seeds.is_empty() {
            return Err(SynthError::NoStreams);
        }

        let thread_count = self.params.threads.min(seeds.len()).max(1);
        // Popped from the back, so stream 0 starts first
        let queue = Mutex::new((0..seeds.len()).rev().collect::<Vec<_>>());
        let (tx, rx) = unbounded();

        let (mixed, panicked) = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..thread_count)
                .map(|_| {
                    let tx = tx.clone();
                    let queue = &queue;
                    scope.spawn(move || loop {
                        let Some(index) = queue.lock().pop() else {
                            break;
                        };
                        let result = job.render(index, seeds[index]);
                        if tx.send((index, result)).is_err() {
                            break;
                        }
                    })
                })
                .collect();
            drop(tx);

            tracing::info!("Mixing down {} streams", seeds.len());
            let mixed = mix_in_order(&rx, seeds.len());
            if mixed.is_err() {
                // Let workers finish their current stream and stop
                queue.lock().clear();
            }

            let panicked = handles
                .into_iter()
                .map(|handle| handle.join().is_err())
                .fold(false, |any, failed| any || failed);
            (mixed, panicked)
        });
        if panicked {
            return Err(SynthError::WorkerPanicked);
        }
        mixed
    }
}

/// Sum streams into the mix in index order as they arrive.
///
/// A stream that finishes ahead of a lower index is held until the gap is
/// filled, so the mix is the same for any thread count.
fn mix_in_order(rx: &Receiver<StreamResult>, count: usize) -> Result<StereoBuffer, SynthError> {
    let mut bus = MixBus::new();
    let mut early: BTreeMap<usize, StereoBuffer> = BTreeMap::new();

    for (index, result) in rx.iter() {
        early.insert(index, result?);
        while let Some(stream) = early.remove(&bus.streams()) {
            bus.add(&stream)?;
        }
    }

    if bus.streams() < count {
        return Err(SynthError::WorkerPanicked);
    }
    bus.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, EffectSpec, FilterMode, FilterParams};
    use crate::generator::Block;
    use crate::mastering::MasteringParams;
    use std::f32::consts::PI;

    fn sine(freq: f32, secs: f32) -> Vec<f32> {
        let len = (44100.0 * secs) as usize;
        (0..len)
            .map(|i| {
                let s = (2.0 * PI * freq * i as f32 / 44100.0).sin() * 0.8;
                if s == 0.0 {
                    1.0 / 32767.0
                } else {
                    s
                }
            })
            .collect()
    }

    fn effects() -> Vec<EffectSpec> {
        vec![
            EffectSpec {
                kind: EffectKind::Convolve,
                identifier: "a".to_string(),
                strength: 0.5,
            },
            EffectSpec {
                kind: EffectKind::Filter(FilterParams {
                    mode: FilterMode::LowPass,
                    cutoff: 3000.0,
                    transition_width: 500.0,
                    attenuation_db: 60.0,
                }),
                identifier: "b".to_string(),
                strength: 1.0,
            },
        ]
    }

    fn loop_params(threads: usize) -> SynthParams {
        SynthParams {
            grain_size: 882,
            grain_spacing: 8820,
            num_streams: 4,
            num_groups: 2,
            num_features: 3,
            zero_crossings: true,
            mode: GeneratorMode::Loop {
                repeats: 1,
                grains_per_group: 5,
            },
            effects: effects(),
            mastering: MasteringParams::default(),
            threads,
        }
    }

    #[test]
    fn test_loop_run_end_to_end() {
        let source = sine(440.0, 1.0);
        let stats = RunStats::new();
        let mut rng = StdRng::seed_from_u64(42);
        let synth = Synthesizer::new(loop_params(2));
        let rendering = synth.run(&source, 44100, &mut rng, &stats).unwrap();

        // 5 grains x 2 groups x 1 repeat, plus one grain of padding
        assert_eq!(rendering.frames(), 10 * 882 + 882);
        assert_eq!(rendering.num_streams, 4);
        assert_eq!(rendering.group_sizes.iter().sum::<usize>(), 5);

        let limit = (0.9 * 32767.0) as i16;
        assert!(rendering.samples.iter().all(|&s| s.abs() <= limit));
        assert!(rendering.samples.iter().any(|&s| s != 0));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events, 5);
        assert_eq!(snapshot.grains, 40);
        // Strength 1.0 on the grains' own rows fires often
        assert!(snapshot.filterings > 0);
    }

    #[test]
    fn test_seeded_run_independent_of_threads() {
        let source = sine(440.0, 1.0);

        let render = |threads: usize| {
            let stats = RunStats::new();
            let mut rng = StdRng::seed_from_u64(7);
            Synthesizer::new(loop_params(threads))
                .run(&source, 44100, &mut rng, &stats)
                .unwrap()
                .samples
        };

        assert_eq!(render(1), render(4));
    }

    #[test]
    fn test_block_run() {
        let source = sine(330.0, 1.0);
        let stats = RunStats::new();
        let mut rng = StdRng::seed_from_u64(3);
        let params = SynthParams {
            mode: GeneratorMode::Block {
                blocks: vec![
                    Block {
                        identifier: "a".to_string(),
                        start: 0,
                        end: 6,
                        alpha: 0.5,
                    },
                    Block {
                        identifier: "b".to_string(),
                        start: 4,
                        end: 12,
                        alpha: 0.0,
                    },
                ],
                emptiness: 0.1,
            },
            effects: Vec::new(),
            threads: 3,
            ..loop_params(1)
        };

        let rendering = Synthesizer::new(params)
            .run(&source, 44100, &mut rng, &stats)
            .unwrap();
        assert_eq!(rendering.frames(), 12 * 882 + 882);
        assert_eq!(stats.snapshot().grains, 4 * 12);
        assert_eq!(stats.snapshot().filterings, 0);
    }

    #[test]
    fn test_block_identifiers_exceed_groups() {
        let source = sine(330.0, 1.0);
        let stats = RunStats::new();
        let mut rng = StdRng::seed_from_u64(3);
        let blocks = ["a", "b", "c"]
            .iter()
            .map(|id| Block {
                identifier: id.to_string(),
                start: 0,
                end: 4,
                alpha: 0.0,
            })
            .collect();
        let params = SynthParams {
            mode: GeneratorMode::Block {
                blocks,
                emptiness: 0.0,
            },
            ..loop_params(1)
        };

        let result = Synthesizer::new(params).run(&source, 44100, &mut rng, &stats);
        assert!(matches!(result, Err(SynthError::TooFewGroups { .. })));
    }

    #[test]
    fn test_source_too_short() {
        let stats = RunStats::new();
        let mut rng = StdRng::seed_from_u64(3);
        let result = Synthesizer::new(loop_params(1)).run(&[0.5; 1000], 44100, &mut rng, &stats);
        assert!(matches!(result, Err(SynthError::Analysis(_))));
    }

    fn constant(value: f32) -> StereoBuffer {
        StereoBuffer {
            left: vec![value; 4],
            right: vec![-value; 4],
        }
    }

    #[test]
    fn test_mix_in_order_reorders_early_streams() {
        let streams: Vec<StereoBuffer> = [0.1, 0.25, 0.3, 0.05].map(constant).to_vec();
        let (tx, rx) = unbounded();
        for index in [2, 0, 3, 1] {
            tx.send((index, Ok(streams[index].clone()))).unwrap();
        }
        drop(tx);

        let mixed = mix_in_order(&rx, streams.len()).unwrap();
        assert_eq!(mixed, crate::mixer::mixdown(&streams).unwrap());
    }

    #[test]
    fn test_mix_in_order_missing_stream() {
        let (tx, rx) = unbounded();
        tx.send((0, Ok(constant(0.1)))).unwrap();
        tx.send((2, Ok(constant(0.1)))).unwrap();
        drop(tx);
        assert_eq!(mix_in_order(&rx, 3), Err(SynthError::WorkerPanicked));
    }

    #[test]
    fn test_mix_in_order_stream_error() {
        let (tx, rx) = unbounded();
        tx.send((1, Ok(constant(0.1)))).unwrap();
        tx.send((0, Err(SynthError::NoStreams))).unwrap();
        drop(tx);
        assert_eq!(mix_in_order(&rx, 2), Err(SynthError::NoStreams));
    }

    #[test]
    fn test_no_streams() {
        let source = sine(440.0, 1.0);
        let stats = RunStats::new();
        let mut rng = StdRng::seed_from_u64(3);
        let params = SynthParams {
            num_streams: 0,
            ..loop_params(1)
        };
        let result = Synthesizer::new(params).run(&source, 44100, &mut rng, &stats);
        assert_eq!(result.map(|r| r.frames()), Err(SynthError::NoStreams));
    }
}
