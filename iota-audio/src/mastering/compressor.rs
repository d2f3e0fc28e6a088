//! Window compressor
//!
//! A simple level compressor without attack or release:
//! - The mix is cut into fixed windows and each window's mean absolute level
//!   is measured across both channels
//! - The knee is the level exceeded by the loudest `threshold` fraction of
//!   windows
//! - Windows at or above the knee are scaled so their mean moves towards the
//!   knee by `ratio`

use super::MasteringStage;
use crate::stream::StereoBuffer;

/// Window length in frames
pub const COMPRESSOR_WINDOW: usize = 16;

/// Summary of one compressor pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompressionReport {
    pub knee: Option<f32>,
    pub windows: usize,
    pub windows_compressed: usize,
    pub mean_before: f32,
    pub mean_after: f32,
}

pub struct WindowCompressor {
    /// Fraction of windows above the knee (0 to 1)
    threshold: f32,
    ratio: f32,
    last_report: CompressionReport,
}

impl WindowCompressor {
    pub fn new(threshold: f32, ratio: f32) -> Self {
        Self {
            threshold,
            ratio,
            last_report: CompressionReport::default(),
        }
    }

    pub fn last_report(&self) -> CompressionReport {
        self.last_report
    }

    fn window_means(&self, buffer: &StereoBuffer) -> Vec<f32> {
        buffer
            .left
            .chunks(COMPRESSOR_WINDOW)
            .zip(buffer.right.chunks(COMPRESSOR_WINDOW))
            .map(|(l, r)| {
                let sum: f32 = l.iter().chain(r).map(|s| s.abs()).sum();
                sum / (l.len() + r.len()) as f32
            })
            .collect()
    }

    /// Knee level, `None` when no window reaches the threshold fraction
    fn knee(&self, means: &[f32]) -> Option<f32> {
        let mut sorted = means.to_vec();
        sorted.sort_by(f32::total_cmp);
        let len = sorted.len() as f32;
        let index = (len - len * self.threshold) as usize;
        sorted.get(index).copied()
    }

    /// Compress in place and report what changed
    pub fn compress(&mut self, buffer: &mut StereoBuffer) -> CompressionReport {
        let means = self.window_means(buffer);
        let mut report = CompressionReport {
            knee: self.knee(&means),
            windows: means.len(),
            mean_before: average(&means),
            ..Default::default()
        };

        if let Some(knee) = report.knee {
            let inv_ratio = 1.0 / self.ratio;
            let windows = buffer
                .left
                .chunks_mut(COMPRESSOR_WINDOW)
                .zip(buffer.right.chunks_mut(COMPRESSOR_WINDOW));

            for ((left, right), &mean) in windows.zip(&means) {
                if mean < knee || mean <= 0.0 {
                    continue;
                }
                let target = knee + (mean - knee) * inv_ratio;
                let gain = target / mean;
                for s in left.iter_mut().chain(right.iter_mut()) {
                    *s *= gain;
                }
                report.windows_compressed += 1;
            }
        }

        report.mean_after = average(&self.window_means(buffer));
        tracing::debug!(
            "Compressor knee {:?}: {}/{} windows compressed, mean level {:.4} -> {:.4}",
            report.knee,
            report.windows_compressed,
            report.windows,
            report.mean_before,
            report.mean_after
        );
        self.last_report = report;
        report
    }
}

impl MasteringStage for WindowCompressor {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        self.compress(buffer);
    }

    fn name(&self) -> &'static str {
        "compressor"
    }
}

fn average(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
