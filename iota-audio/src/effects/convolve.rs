//! FFT-based linear convolution

use rustfft::{num_complex::Complex, FftPlanner};

/// Linear convolution through the FFT.
///
/// Holds an FFT planner so repeated convolutions of the same size reuse
/// their plans. Not shared between threads; each stream worker owns one.
pub struct Convolver {
    planner: FftPlanner<f32>,
    buffer_a: Vec<Complex<f32>>,
    buffer_b: Vec<Complex<f32>>,
}

impl Default for Convolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Convolver {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer_a: Vec::new(),
            buffer_b: Vec::new(),
        }
    }

    /// Full convolution, `a.len() + b.len() - 1` samples
    pub fn full(&mut self, a: &[f32], b: &[f32]) -> Vec<f32> {
        if a.is_empty() || b.is_empty() {
            return Vec::new();
        }

        let out_len = a.len() + b.len() - 1;
        let fft_size = out_len.next_power_of_two();

        Self::load(&mut self.buffer_a, a, fft_size);
        Self::load(&mut self.buffer_b, b, fft_size);

        let forward = self.planner.plan_fft_forward(fft_size);
        forward.process(&mut self.buffer_a);
        forward.process(&mut self.buffer_b);

        for (x, y) in self.buffer_a.iter_mut().zip(&self.buffer_b) {
            *x = *x * *y;
        }

        let inverse = self.planner.plan_fft_inverse(fft_size);
        inverse.process(&mut self.buffer_a);

        let scale = 1.0 / fft_size as f32;
        self.buffer_a[..out_len].iter().map(|c| c.re * scale).collect()
    }

    /// Centred convolution of length `max(a.len(), b.len())`.
    ///
    /// The output starts `(min(a.len(), b.len()) - 1) / 2` samples into the
    /// full convolution.
    pub fn same(&mut self, a: &[f32], b: &[f32]) -> Vec<f32> {
        let full = self.full(a, b);
        if full.is_empty() {
            return full;
        }

        let len = a.len().max(b.len());
        let start = (a.len().min(b.len()) - 1) / 2;
        full[start..start + len].to_vec()
    }

    /// Zero-padded copy of `samples` into a complex buffer
    fn load(buffer: &mut Vec<Complex<f32>>, samples: &[f32], size: usize) {
        buffer.clear();
        buffer.extend(samples.iter().map(|&s| Complex::new(s, 0.0)));
        buffer.resize(size, Complex::new(0.0, 0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(a: &[f32], b: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; a.len() + b.len() - 1];
        for (i, x) in a.iter().enumerate() {
            for (j, y) in b.iter().enumerate() {
                out[i + j] += x * y;
            }
        }
        out
    }

    #[test]
    fn test_full_matches_direct() {
        let a = [1.0, 2.0, 3.0, -1.0, 0.5];
        let b = [0.25, -0.5, 1.0];
        let mut conv = Convolver::new();
        let fast = conv.full(&a, &b);
        let slow = direct(&a, &b);
        assert_eq!(fast.len(), slow.len());
        for (f, s) in fast.iter().zip(&slow) {
            assert!((f - s).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_length_and_centre() {
        let a = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        // Identity kernel centred on its middle tap
        let b = [0.0, 1.0, 0.0];
        let mut conv = Convolver::new();
        let out = conv.same(&a, &b);
        assert_eq!(out.len(), a.len());
        for (o, x) in out.iter().zip(&a) {
            assert!((o - x).abs() < 1e-6);
        }
    }

    #[test]
    fn test_same_kernel_longer_than_signal() {
        let a = [1.0, 1.0];
        let b = [1.0; 5];
        let mut conv = Convolver::new();
        assert_eq!(conv.same(&a, &b).len(), 5);
    }

    #[test]
    fn test_empty() {
        let mut conv = Convolver::new();
        assert!(conv.full(&[], &[1.0]).is_empty());
        assert!(conv.same(&[1.0], &[]).is_empty());
    }
}
