//! IOTA - granular synthesis from a clustered source sound
//!
//! Loads a source, groups its grains by spectral similarity, renders many
//! grain streams from those groups and writes the mastered stereo mix.

mod cli;

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use iota_audio::{RunStats, StatsSnapshot, Synthesizer};
use iota_io::{write_wav, Config, SourceLoader};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let config = Config::from_raw(cli.into_raw(), &mut rng).context("Invalid configuration")?;

    let source = SourceLoader::new()
        .load(&config.infile)
        .with_context(|| format!("Failed to load {}", config.infile.display()))?;
    let params = config.resolve(source.sample_rate)?;
    tracing::debug!(
        "Grain size {} samples, spacing {} samples, {} streams, {} threads",
        params.grain_size,
        params.grain_spacing,
        params.num_streams,
        params.threads
    );

    let stats = RunStats::new();
    let started = Instant::now();
    let rendering = Synthesizer::new(params)
        .run(&source.samples, source.sample_rate, &mut rng, &stats)
        .context("Synthesis failed")?;

    write_wav(&config.outfile, rendering.sample_rate, &rendering.samples)
        .with_context(|| format!("Failed to write {}", config.outfile.display()))?;

    if config.debug >= 1 {
        report(&stats.snapshot(), started.elapsed().as_secs_f64());
    }
    tracing::info!(
        "Done: {:.2}s of audio",
        rendering.frames() as f64 / rendering.sample_rate as f64
    );

    Ok(())
}

/// Log level follows `--debug` unless `RUST_LOG` says otherwise
fn init_tracing(debug: u8) {
    let default_level = match debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn report(stats: &StatsSnapshot, elapsed_secs: f64) {
    tracing::info!("Run statistics:");
    tracing::info!("  Events:       {}", stats.events);
    tracing::info!("  Grains:       {}", stats.grains);
    tracing::info!("  Convolutions: {}", stats.convolutions);
    tracing::info!("  Filterings:   {}", stats.filterings);
    tracing::info!("  Time:         {:.2}s", elapsed_secs);
}
