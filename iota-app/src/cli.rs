//! Command line arguments

use clap::{Parser, ValueEnum};
use iota_io::{ModeName, RawConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Loop,
    Block,
}

impl From<ModeArg> for ModeName {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Loop => ModeName::Loop,
            ModeArg::Block => ModeName::Block,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "iota",
    version,
    about = "Granular synthesis driven by spectral clustering of a source sound"
)]
pub struct Cli {
    /// Input audio file
    #[arg(short, long)]
    pub infile: Option<PathBuf>,

    /// Audio file to output to
    #[arg(short, long)]
    pub outfile: Option<PathBuf>,

    /// Length of each grain, in ms
    #[arg(short = 'g', long = "grainsize", default_value_t = 20)]
    pub grain_size: u32,

    /// Spacing between each grain in analysis, in ms
    #[arg(short = 'c', long = "grainspacing", default_value_t = 200)]
    pub grain_spacing: u32,

    /// Number of grain streams
    #[arg(short = 's', long = "numstreams", default_value_t = 100)]
    pub num_streams: usize,

    /// Number of groups to use for clustering
    #[arg(short = 'r', long = "numgroups", default_value_t = 5)]
    pub num_groups: usize,

    /// Number of features to use for clustering
    #[arg(short = 'f', long = "numfeatures", default_value_t = 8)]
    pub num_features: usize,

    /// Don't use zero-crossings as a clustering feature
    #[arg(short = 'z', long = "disablezerocrossings")]
    pub disable_zero_crossings: bool,

    /// Generator mode
    #[arg(short, long, value_enum, default_value_t = ModeArg::Loop)]
    pub mode: ModeArg,

    /// Number of loops to use in loop mode
    #[arg(short = 'l', long = "numloops", default_value_t = 3)]
    pub num_loops: usize,

    /// Number of seconds each group should last in loop mode
    #[arg(short = 'p', long = "grouplength", default_value_t = 2.0)]
    pub group_length: f32,

    /// Blocks for block mode, as repeated 'identifier start end fade'
    #[arg(short, long, num_args = 1..)]
    pub blocks: Vec<String>,

    /// Baseline chance of silence in block mode
    #[arg(short, long, default_value_t = 0.2)]
    pub emptiness: f32,

    /// Effects, as repeated 'type identifier strength [cutoff transition attenuation]'
    #[arg(short = 'x', long, num_args = 1..)]
    pub effects: Vec<String>,

    /// Fraction of the dynamic range to compress, e.g. 0.1 compresses the top 10 percent
    #[arg(short = 't', long = "compthresh", default_value_t = 0.2)]
    pub comp_thresh: f32,

    /// Compression ratio
    #[arg(short = 'a', long = "compratio", default_value_t = 2.5)]
    pub comp_ratio: f32,

    /// Level to normalise to
    #[arg(short = 'n', long = "normlevel", default_value_t = 0.9)]
    pub norm_level: f32,

    /// Size of the fade in and fade out (Tukey window alpha)
    #[arg(short = 'd', long = "fadesize", default_value_t = 0.05)]
    pub fade_size: f32,

    /// Debug level: 0 is quiet, 1 adds details and run statistics, 2 traces everything
    #[arg(short = 'u', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub debug: u8,

    /// Seed for the random generator, for repeatable output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads for stream generation (defaults to available cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl Cli {
    pub fn into_raw(self) -> RawConfig {
        let threads = self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

        RawConfig {
            infile: self.infile,
            outfile: self.outfile,
            grain_size_ms: self.grain_size,
            grain_spacing_ms: self.grain_spacing,
            num_streams: self.num_streams,
            num_groups: self.num_groups,
            num_features: self.num_features,
            disable_zero_crossings: self.disable_zero_crossings,
            mode: self.mode.into(),
            num_loops: self.num_loops,
            group_length: self.group_length,
            blocks: self.blocks,
            emptiness: self.emptiness,
            effects: self.effects,
            comp_thresh: self.comp_thresh,
            comp_ratio: self.comp_ratio,
            norm_level: self.norm_level,
            fade_size: self.fade_size,
            debug: self.debug,
            threads,
        }
    }
}
