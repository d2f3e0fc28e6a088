//! Kaiser-windowed FIR low-pass / high-pass filters and their cache
//!
//! Kernels are designed once per unique parameter set with the windowed-sinc
//! method and kept for the rest of the run. The high-pass is derived from the
//! low-pass by spectral inversion.

use super::convolve::Convolver;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use thiserror::Error;

/// Smallest attenuation the Kaiser order formula is defined for (dB)
pub const MIN_ATTENUATION_DB: f32 = 8.0;

/// Errors that can occur while designing a filter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("attenuation of {0} dB is too small for the Kaiser formula (minimum 8 dB)")]
    AttenuationTooSmall(f32),
    #[error("cutoff {cutoff} Hz must lie between 0 and the Nyquist frequency ({nyquist} Hz)")]
    CutoffOutOfRange { cutoff: f32, nyquist: f32 },
    #[error("transition width must be positive, got {0} Hz")]
    InvalidTransitionWidth(f32),
}

/// Filter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    LowPass,
    HighPass,
}

impl FilterMode {
    pub fn name(self) -> &'static str {
        match self {
            FilterMode::LowPass => "lowpass",
            FilterMode::HighPass => "highpass",
        }
    }
}

/// Parameters of one FIR filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    pub mode: FilterMode,
    /// Cutoff frequency in Hz
    pub cutoff: f32,
    /// Width of the transition band in Hz
    pub transition_width: f32,
    /// Stop-band attenuation in dB
    pub attenuation_db: f32,
}

impl FilterParams {
    fn key(&self) -> FilterKey {
        FilterKey {
            mode: self.mode,
            cutoff: self.cutoff.to_bits(),
            transition_width: self.transition_width.to_bits(),
            attenuation_db: self.attenuation_db.to_bits(),
        }
    }
}

/// Exact-equality cache key (float bit patterns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FilterKey {
    mode: FilterMode,
    cutoff: u32,
    transition_width: u32,
    attenuation_db: u32,
}

/// Append-only store of designed FIR kernels for one run.
///
/// Safe to share between stream workers. Lookups take a read lock; on a miss
/// the kernel is designed without holding any lock and inserted only if no
/// other worker got there first.
pub struct FilterCache {
    sample_rate: u32,
    kernels: RwLock<HashMap<FilterKey, Arc<[f32]>>>,
}

impl FilterCache {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            kernels: RwLock::new(HashMap::new()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of distinct kernels designed so far
    pub fn len(&self) -> usize {
        self.kernels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.read().is_empty()
    }

    /// Get the kernel for `params`, designing it on first use
    pub fn kernel(&self, params: &FilterParams) -> Result<Arc<[f32]>, FilterError> {
        let key = params.key();
        if let Some(kernel) = self.kernels.read().get(&key) {
            return Ok(Arc::clone(kernel));
        }

        let designed: Arc<[f32]> = design_kernel(params, self.sample_rate)?.into();
        let mut kernels = self.kernels.write();
        Ok(Arc::clone(kernels.entry(key).or_insert(designed)))
    }

    /// Filter `audio`, returning a buffer of the same length
    pub fn apply(
        &self,
        audio: &[f32],
        params: &FilterParams,
        convolver: &mut Convolver,
    ) -> Result<Vec<f32>, FilterError> {
        let kernel = self.kernel(params)?;
        let mut filtered = convolver.same(audio, &kernel);
        // Longer kernels produce a longer "same" output
        filtered.truncate(audio.len());
        Ok(filtered)
    }
}

/// Tap count and Kaiser beta for a given attenuation (dB) and transition
/// width (as a fraction of Nyquist)
pub fn kaiser_order(attenuation_db: f32, width: f64) -> Result<(usize, f64), FilterError> {
    let a = attenuation_db.abs() as f64;
    if a < MIN_ATTENUATION_DB as f64 {
        return Err(FilterError::AttenuationTooSmall(attenuation_db));
    }

    let beta = kaiser_beta(a);
    let taps = (a - 7.95) / 2.285 / (PI * width) + 1.0;
    Ok((taps.ceil() as usize, beta))
}

/// Kaiser window shape parameter for a stop-band attenuation in dB
fn kaiser_beta(a: f64) -> f64 {
    if a > 50.0 {
        0.1102 * (a - 8.7)
    } else if a > 21.0 {
        0.5842 * (a - 21.0).powf(0.4) + 0.07886 * (a - 21.0)
    } else {
        0.0
    }
}

/// Symmetric Kaiser window
fn kaiser_window(len: usize, beta: f64) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let alpha = (len - 1) as f64 / 2.0;
    let denom = bessel_i0(beta);
    (0..len)
        .map(|n| {
            let r = (n as f64 - alpha) / alpha;
            bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / denom
        })
        .collect()
}

/// Zeroth-order modified Bessel function of the first kind (power series)
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;
    loop {
        term *= (half / k) * (half / k);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
        k += 1.0;
    }
    sum
}

#[inline]
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Design a FIR kernel for `params` at `sample_rate`
pub fn design_kernel(params: &FilterParams, sample_rate: u32) -> Result<Vec<f32>, FilterError> {
    let nyquist = sample_rate as f64 / 2.0;
    if params.transition_width <= 0.0 {
        return Err(FilterError::InvalidTransitionWidth(params.transition_width));
    }
    if params.cutoff <= 0.0 || params.cutoff as f64 >= nyquist {
        return Err(FilterError::CutoffOutOfRange {
            cutoff: params.cutoff,
            nyquist: nyquist as f32,
        });
    }

    let width = params.transition_width as f64 / nyquist;
    let (num_taps, beta) = kaiser_order(params.attenuation_db, width)?;
    let cutoff = params.cutoff as f64 / nyquist;

    // Windowed sinc low-pass, scaled to unity gain at DC
    let centre = (num_taps - 1) as f64 / 2.0;
    let window = kaiser_window(num_taps, beta);
    let mut taps: Vec<f64> = window
        .iter()
        .enumerate()
        .map(|(n, w)| cutoff * sinc(cutoff * (n as f64 - centre)) * w)
        .collect();
    let sum: f64 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }

    if params.mode == FilterMode::HighPass {
        for t in &mut taps {
            *t = -*t;
        }
        // Integer division: exact centre for odd tap counts only
        taps[num_taps / 2] += 1.0;
    }

    Ok(taps.into_iter().map(|t| t as f32).collect())
}
