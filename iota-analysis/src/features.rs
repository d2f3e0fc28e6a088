//! Per-event feature extraction
//!
//! Each event is described by a handful of scalar features:
//! 1. Optionally, a zero-crossing rate estimate (feature 0)
//! 2. N spectral band levels at randomly chosen FFT bins
//!
//! Every feature row is peak-normalised across all events before clustering.

use crate::error::AnalysisError;
use crate::window::{hann, normalise};
use rand::Rng;
use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

/// Width (in FFT bins) of the neighbourhood averaged for each spectral feature
pub const FEATURE_WIDTH: usize = 16;

/// Floor applied to magnitudes before conversion to dB
const MIN_MAGNITUDE: f32 = 1e-10;

/// Feature values laid out as rows (features) by columns (events)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    /// Build a matrix from feature rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { rows }
    }

    pub fn num_features(&self) -> usize {
        self.rows.len()
    }

    pub fn num_events(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Values of one feature across all events
    pub fn row(&self, feature: usize) -> &[f32] {
        &self.rows[feature]
    }

    /// Feature vector of one event
    pub fn column(&self, event: usize) -> Vec<f32> {
        self.rows.iter().map(|row| row[event]).collect()
    }

    /// Events as points (one feature vector per event), the transposed view
    pub fn points(&self) -> Vec<Vec<f32>> {
        (0..self.num_events()).map(|e| self.column(e)).collect()
    }

    /// Peak-normalise every row independently to unit magnitude
    pub fn normalise_rows(&mut self) {
        for row in &mut self.rows {
            normalise(row, 1.0);
        }
    }

    /// Prepend the rows of `other` in front of this matrix
    pub fn prepend(&mut self, other: FeatureMatrix) {
        let mut rows = other.rows;
        rows.append(&mut self.rows);
        self.rows = rows;
    }
}

/// Spectral feature extractor with a fixed set of randomly chosen bins
pub struct SpectralFeatures {
    spacing: usize,
    width: usize,
    bins: Vec<usize>,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
}

impl SpectralFeatures {
    /// Choose `n_features` bin centres uniformly in `[width/2, spacing/8)`
    pub fn new<R: Rng + ?Sized>(
        spacing: usize,
        n_features: usize,
        width: usize,
        rng: &mut R,
    ) -> Result<Self, AnalysisError> {
        let low = width / 2;
        let high = spacing / 8;
        if n_features > 0 && high <= low {
            return Err(AnalysisError::SpacingTooSmall { spacing, width });
        }

        let bins = (0..n_features).map(|_| rng.gen_range(low..high)).collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(spacing);

        Ok(Self {
            spacing,
            width,
            bins,
            fft,
            window: hann(spacing),
            fft_buffer: vec![Complex::new(0.0, 0.0); spacing],
        })
    }

    /// Chosen bin centres
    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Compute one row per bin, one column per event
    pub fn extract(&mut self, audio: &[f32], events: &[usize]) -> FeatureMatrix {
        let mut rows = vec![vec![0.0f32; events.len()]; self.bins.len()];

        for (col, &event) in events.iter().enumerate() {
            let levels = self.event_levels(&audio[event..event + self.spacing]);
            for (row, level) in rows.iter_mut().zip(levels) {
                row[col] = level;
            }
        }

        FeatureMatrix::from_rows(rows)
    }

    /// Mean absolute dB level around each chosen bin for a single event
    fn event_levels(&mut self, event: &[f32]) -> Vec<f32> {
        for (slot, (s, w)) in self.fft_buffer.iter_mut().zip(event.iter().zip(&self.window)) {
            *slot = Complex::new(s * w, 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let half = self.width / 2;
        self.bins
            .iter()
            .map(|&bin| {
                let band = &self.fft_buffer[bin - half..bin + half];
                let sum: f32 = band
                    .iter()
                    .map(|c| (20.0 * c.norm().max(MIN_MAGNITUDE).log10()).abs())
                    .sum();
                (sum / band.len().max(1) as f32).abs()
            })
            .collect()
    }
}

/// Zero-crossing rate of each event, scaled to crossings per second
pub fn zero_crossings(audio: &[f32], events: &[usize], spacing: usize, sample_rate: u32) -> FeatureMatrix {
    let row = events
        .iter()
        .map(|&event| {
            let window = &audio[event..event + spacing];
            let crossings = window.windows(2).filter(|w| w[0] * w[1] < 0.0).count();
            crossings as f32 * sample_rate as f32 / spacing as f32
        })
        .collect();

    FeatureMatrix::from_rows(vec![row])
}

/// Full feature pipeline for a set of events.
///
/// When zero crossings are enabled they take the first of the `n_features`
/// slots and the remaining slots are spectral.
pub fn extract_features<R: Rng + ?Sized>(
    audio: &[f32],
    events: &[usize],
    spacing: usize,
    sample_rate: u32,
    n_features: usize,
    zero_crossing: bool,
    rng: &mut R,
) -> Result<FeatureMatrix, AnalysisError> {
    let n_spectral = if zero_crossing {
        n_features.saturating_sub(1)
    } else {
        n_features
    };

    tracing::info!("Selecting {} random spectral features", n_spectral);
    let mut spectral = SpectralFeatures::new(spacing, n_spectral, FEATURE_WIDTH, rng)?;
    let mut features = spectral.extract(audio, events);
    features.normalise_rows();

    if zero_crossing {
        let mut frequencies = zero_crossings(audio, events, spacing, sample_rate);
        frequencies.normalise_rows();
        features.prepend(frequencies);
    }

    if features.num_features() == 0 {
        return Err(AnalysisError::EmptyFeatures);
    }

    Ok(features)
}
