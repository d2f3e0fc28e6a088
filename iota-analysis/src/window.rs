//! Window functions shared by analysis and synthesis

use std::f32::consts::PI;

/// Symmetric Hann window of `len` samples.
///
/// Endpoints are zero (denominator is `len - 1`), matching the classic
/// `hanning` definition. A single-sample window is `[1.0]`.
pub fn hann(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f32;
            (0..len)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
                .collect()
        }
    }
}

/// Tukey (tapered cosine) window.
///
/// `alpha` is the fraction of the window spent tapering, split evenly between
/// the fade-in and the fade-out. `alpha <= 0` gives a rectangular window and
/// `alpha >= 1` degenerates to a Hann window.
pub fn tukey(len: usize, alpha: f32) -> Vec<f32> {
    if alpha <= 0.0 {
        return vec![1.0; len];
    }
    if alpha >= 1.0 {
        return hann(len);
    }

    let half = alpha / 2.0;
    let step = if len > 1 { 1.0 / (len - 1) as f32 } else { 0.0 };

    (0..len)
        .map(|i| {
            let x = i as f32 * step;
            if x < half {
                0.5 * (1.0 + (2.0 * PI / alpha * (x - half)).cos())
            } else if x >= 1.0 - half {
                0.5 * (1.0 + (2.0 * PI / alpha * (x - 1.0 + half)).cos())
            } else {
                1.0
            }
        })
        .collect()
}

/// Peak absolute value of a signal
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Scale a signal in place so its peak touches `level`.
///
/// Silent input is left untouched.
pub fn normalise(samples: &mut [f32], level: f32) {
    let peak = peak(samples);
    if peak > 0.0 {
        let gain = level / peak;
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_endpoints() {
        let w = hann(9);
        assert_eq!(w.len(), 9);
        assert!(w[0].abs() < 1e-6);
        assert!(w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tukey_rectangular() {
        assert!(tukey(16, 0.0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_tukey_full_is_hann() {
        assert_eq!(tukey(32, 1.0), hann(32));
    }

    #[test]
    fn test_tukey_taper() {
        let w = tukey(101, 0.1);
        assert!(w[0].abs() < 1e-6);
        assert!(w[100].abs() < 1e-6);
        // Flat top between the tapers
        assert!(w[10..91].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        // Symmetric
        for i in 0..50 {
            assert!((w[i] - w[100 - i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_normalise() {
        let mut s = vec![0.1, -0.4, 0.2];
        normalise(&mut s, 0.8);
        assert!((peak(&s) - 0.8).abs() < 1e-6);
        assert!((s[1] + 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalise_silence_untouched() {
        let mut s = vec![0.0; 4];
        normalise(&mut s, 1.0);
        assert!(s.iter().all(|&v| v == 0.0));
    }
}
