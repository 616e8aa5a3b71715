//! Zero-phase FIR application by overlap-add FFT convolution.
//!
//! Zero phase comes from shifting the output left by the group delay
//! `(N-1)/2`, not from a forward-backward pass, so the magnitude response is
//! exactly the designed one. Edges are handled with reflect-limited padding
//! of `N-1` samples on each side.
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Filter every channel of `data` (`[C, T]`), returning a new array.
///
/// `h` must have odd length.
pub fn filter_data(data: &Array2<f64>, h: &[f64]) -> Result<Array2<f64>> {
    ensure!(h.len() % 2 == 1, "FIR length must be odd, got {}", h.len());
    let mut out = Array2::<f64>::zeros(data.dim());
    if data.ncols() == 0 {
        return Ok(out);
    }
    let conv = OverlapAdd::new(h, data.ncols());
    for (src, mut dst) in data.rows().into_iter().zip(out.rows_mut()) {
        let row = src.to_vec();
        let y = conv.apply(&row);
        dst.assign(&ArrayView1::from(&y));
    }
    Ok(out)
}

/// Filter a single 1-D signal; output has the same length as `x`.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Result<Vec<f64>> {
    ensure!(h.len() % 2 == 1, "FIR length must be odd, got {}", h.len());
    if x.is_empty() {
        return Ok(vec![]);
    }
    Ok(OverlapAdd::new(h, x.len()).apply(x))
}

/// Pre-planned overlap-add convolver for signals of one length.
struct OverlapAdd {
    n_h: usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    fn new(h: &[f64], n_x: usize) -> Self {
        let n_h = h.len();
        let n_ext = n_x + 2 * (n_h - 1);
        let n_fft = choose_fft_len(n_h, n_ext);

        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = zero_padded(h, n_fft);
        fwd.process(&mut h_fft);

        Self { n_h, n_fft, h_fft, fwd, inv }
    }

    fn apply(&self, x: &[f64]) -> Vec<f64> {
        let n_x = x.len();
        let shift = (self.n_h - 1) / 2;
        let n_edge = self.n_h - 1;

        let x_ext = reflect_limited_pad(x, n_edge, n_edge);
        let n_ext = x_ext.len();

        let n_seg = self.n_fft - self.n_h + 1;
        let n_segments = n_ext.div_ceil(n_seg);
        let inv_scale = 1.0 / self.n_fft as f64;
        let mut acc = vec![0.0_f64; n_ext];

        for seg_idx in 0..n_segments {
            let start = seg_idx * n_seg;
            let stop = (start + n_seg).min(n_ext);

            let mut buf = zero_padded(&x_ext[start..stop], self.n_fft);
            self.fwd.process(&mut buf);
            for (b, &hf) in buf.iter_mut().zip(&self.h_fft) {
                *b *= hf;
            }
            self.inv.process(&mut buf);

            // Write back shifted by the group delay.
            let out_start = start.saturating_sub(shift);
            let out_end = (out_start + self.n_fft).min(n_ext);
            let prod_start = shift.saturating_sub(start);
            for (o, p) in (out_start..out_end).zip(prod_start..self.n_fft) {
                acc[o] += buf[p].re * inv_scale;
            }
        }

        acc[n_edge..n_edge + n_x].to_vec()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn zero_padded(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    x.iter()
        .map(|&v| Complex::new(v, 0.0))
        .chain(std::iter::repeat(Complex::default()))
        .take(n)
        .collect()
}

/// Odd reflection about the end points, zero-filled when the requested pad
/// is longer than the signal.
///
/// Left:  `pad[i] = 2*x[0] - x[n_l-i]`
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]`
fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.extend(std::iter::repeat(0.0).take(n_l - actual_l));
    out.extend((1..=actual_l).rev().map(|i| 2.0 * x[0] - x[i]));
    out.extend_from_slice(x);
    let last = x[n - 1];
    out.extend((1..=actual_r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_r - actual_r));
    out
}

/// Power-of-two FFT size minimising MNE's overlap-add cost
/// `ceil(n_x / (N - n_h + 1)) * N * (log2(N) + 1) + 4e-5 * N * n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let max_pow = (n_x as f64).log2().ceil() as u32 + 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;

    let mut best_n = 1_usize << max_pow.max(min_pow);
    let mut best_cost = f64::INFINITY;
    for pow in min_pow..=max_pow {
        let n = 1_usize << pow;
        if n < min_fft {
            continue;
        }
        let n_seg = (n - n_h + 1) as f64;
        let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
            + 4e-5 * n as f64 * n_x as f64;
        if cost < best_cost {
            best_cost = cost;
            best_n = n;
        }
    }
    best_n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::design_bandpass;

    #[test]
    fn filter_preserves_length() {
        let x: Vec<f64> = (0..1024).map(|i| (i as f64 / 10.0).sin()).collect();
        let h = design_bandpass(5.0, 50.0, 250.0);
        assert_eq!(filter_1d(&x, &h).unwrap().len(), x.len());
    }

    #[test]
    fn identity_kernel_is_passthrough() {
        let x: Vec<f64> = (0..300).map(|i| ((i * 7) % 13) as f64).collect();
        let y = filter_1d(&x, &[1.0]).unwrap();
        for (a, b) in x.iter().zip(&y) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn delayed_impulse_is_realigned() {
        // h = [0, 0, 1, 0, 0] delays by 2; zero-phase shift must undo it.
        let x: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let y = filter_1d(&x, &[0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        for (a, b) in x.iter().zip(&y) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn bandpass_removes_dc() {
        let x = vec![1.0_f64; 4096];
        let h = design_bandpass(5.0, 50.0, 250.0);
        let y = filter_1d(&x, &h).unwrap();
        let interior = &y[h.len()..y.len() - h.len()];
        let max_val = interior.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(max_val < 1e-6, "DC not removed: max={max_val}");
    }

    #[test]
    fn even_kernel_rejected() {
        assert!(filter_1d(&[1.0, 2.0], &[0.5, 0.5]).is_err());
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = [1.0_f64, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_limited_pad(&x, 3, 0);
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..], &x[..]);
    }

    #[test]
    fn reflect_pad_longer_than_signal_zero_fills() {
        let x = [1.0_f64, 3.0];
        let padded = reflect_limited_pad(&x, 3, 3);
        assert_eq!(padded, vec![0.0, 0.0, -1.0, 1.0, 3.0, 5.0, 0.0, 0.0]);
    }
}
