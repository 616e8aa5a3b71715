//! Short-time Fourier power spectrograms.
//!
//! Numerics follow `scipy.signal.spectrogram` with its defaults
//! (`mode='psd'`, `scaling='density'`, `detrend='constant'`, one-sided):
//!
//! ```text
//! segments  k = 0 .. floor((n - overlap) / step),   step = window_len - overlap
//! X_k[f]    = FFT( w · (x[k·step ..][..window_len] - mean) )
//! P[f, k]   = |X_k[f]|² / (fs · Σ w²)          ×2 for 0 < f < nyquist bin
//! freqs[f]  = f · fs / window_len
//! times[k]  = (window_len / 2 + k · step) / fs
//! ```
//!
//! Values are power spectral density (squared magnitude), not amplitude.
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::{Array1, Array2, Zip};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::config::{SpectrogramParams, WindowKind};
use crate::error::SpectrogramError;

/// Power spectrogram of one channel of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Hz, length `n_freqs`.
    pub freqs: Array1<f64>,
    /// Seconds, length `n_times`.
    pub times: Array1<f64>,
    /// `[n_freqs, n_times]`.
    pub power: Array2<f64>,
}

impl Spectrogram {
    pub fn shape(&self) -> (usize, usize) {
        self.power.dim()
    }
}

/// Reusable STFT state for one `(sfreq, params)` pair.
///
/// Planning the FFT and building the window once lets the extractor run
/// every channel of every epoch through the same plan.
pub struct Stft {
    params: SpectrogramParams,
    sfreq: f64,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
}

impl Stft {
    pub fn new(params: &SpectrogramParams, sfreq: f64) -> Result<Self, SpectrogramError> {
        if params.window_len < 2 {
            return Err(SpectrogramError::WindowTooShort(params.window_len));
        }
        if params.overlap >= params.window_len {
            return Err(SpectrogramError::InvalidOverlap {
                window_len: params.window_len,
                overlap: params.overlap,
            });
        }
        let window = periodic_window(params.window, params.window_len);
        let win_pow: f64 = window.iter().map(|w| w * w).sum();
        let fft = FftPlanner::<f64>::new().plan_fft_forward(params.window_len);
        Ok(Self { params: params.clone(), sfreq, scale: 1.0 / (sfreq * win_pow), window, fft })
    }

    pub fn params(&self) -> &SpectrogramParams {
        &self.params
    }

    /// Frequency axis (Hz).
    pub fn freqs(&self) -> Array1<f64> {
        let n = self.params.window_len as f64;
        Array1::from_shape_fn(self.params.n_freq_bins(), |k| k as f64 * self.sfreq / n)
    }

    /// Segment-centre times (s) for a signal of `n_samples`, starting at `t0`.
    pub fn times(&self, n_samples: usize, t0: f64) -> Array1<f64> {
        let half = self.params.window_len as f64 / 2.0;
        let step = self.params.step() as f64;
        Array1::from_shape_fn(self.params.n_time_bins(n_samples), |k| {
            t0 + (half + k as f64 * step) / self.sfreq
        })
    }

    /// Spectrogram of `x`; `t0` offsets the time axis.
    pub fn compute(&self, x: &[f64], t0: f64) -> Result<Spectrogram, SpectrogramError> {
        let nperseg = self.params.window_len;
        if x.len() < nperseg {
            return Err(SpectrogramError::WindowTooLong { window_len: nperseg, n_samples: x.len() });
        }
        let n_freqs = self.params.n_freq_bins();
        let n_times = self.params.n_time_bins(x.len());
        let step = self.params.step();
        let even = nperseg % 2 == 0;

        let mut power = Array2::<f64>::zeros((n_freqs, n_times));
        let mut buf = vec![Complex::<f64>::default(); nperseg];
        for k in 0..n_times {
            let seg = &x[k * step..k * step + nperseg];
            let mean = if self.params.detrend {
                seg.iter().sum::<f64>() / nperseg as f64
            } else {
                0.0
            };
            for ((b, &v), &w) in buf.iter_mut().zip(seg).zip(&self.window) {
                *b = Complex::new((v - mean) * w, 0.0);
            }
            self.fft.process(&mut buf);

            for f in 0..n_freqs {
                let mut p = buf[f].norm_sqr() * self.scale;
                let is_nyquist = even && f == n_freqs - 1;
                if f != 0 && !is_nyquist {
                    p *= 2.0;
                }
                power[[f, k]] = p;
            }
        }

        Ok(Spectrogram { freqs: self.freqs(), times: self.times(x.len(), t0), power })
    }
}

/// One-shot convenience wrapper around [`Stft`].
pub fn spectrogram(
    x: &[f64],
    sfreq: f64,
    params: &SpectrogramParams,
) -> Result<Spectrogram, SpectrogramError> {
    Stft::new(params, sfreq)?.compute(x, 0.0)
}

/// Element-wise mean of spectrograms that share both axes.
pub fn average(specs: &[Spectrogram]) -> Result<Spectrogram, SpectrogramError> {
    let first = specs
        .first()
        .ok_or_else(|| SpectrogramError::AxisMismatch("no spectrograms to average".into()))?;
    let mut sum = Array2::<f64>::zeros(first.power.dim());
    for (i, s) in specs.iter().enumerate() {
        if s.power.dim() != first.power.dim() || s.freqs != first.freqs || s.times != first.times {
            return Err(SpectrogramError::AxisMismatch(format!(
                "spectrogram {i} is {:?}, expected {:?}",
                s.power.dim(),
                first.power.dim()
            )));
        }
        sum += &s.power;
    }
    let n = specs.len() as f64;
    Ok(Spectrogram {
        freqs: first.freqs.clone(),
        times: first.times.clone(),
        power: sum.mapv(|v| v / n),
    })
}

// ── Channel-averaged spectrogram ─────────────────────────────────────────

/// Channel-mean spectrogram of one epoch, tagged with its source trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAveragedSpectrogram {
    pub freqs: Array1<f64>,
    pub times: Array1<f64>,
    /// `[n_freqs, n_times]`.
    pub power: Array2<f64>,
    /// Index of the source annotation; used as the group id when splitting.
    pub group: usize,
    /// Source annotation description.
    pub description: String,
}

impl ChannelAveragedSpectrogram {
    pub fn from_spectrogram(spec: Spectrogram, group: usize, description: impl Into<String>) -> Self {
        Self {
            freqs: spec.freqs,
            times: spec.times,
            power: spec.power,
            group,
            description: description.into(),
        }
    }

    #[inline]
    pub fn n_freqs(&self) -> usize {
        self.power.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.power.ncols()
    }

    /// Row-major flattening: all time bins of frequency 0, then frequency 1, …
    pub fn flatten(&self) -> Vec<f64> {
        self.power.iter().copied().collect()
    }

    /// Inverse of [`flatten`](Self::flatten).
    pub fn from_flat(
        values: Vec<f64>,
        freqs: Array1<f64>,
        times: Array1<f64>,
        group: usize,
        description: impl Into<String>,
    ) -> Result<Self, SpectrogramError> {
        let (n_freqs, n_times) = (freqs.len(), times.len());
        let len = values.len();
        let power = Array2::from_shape_vec((n_freqs, n_times), values)
            .map_err(|_| SpectrogramError::FlatShape { len, n_freqs, n_times })?;
        Ok(Self { freqs, times, power, group, description: description.into() })
    }

    /// Keep only frequency rows with `lo_hz <= f <= hi_hz`.
    ///
    /// Fails if the range is not `0 <= lo_hz <= hi_hz` or keeps no row.
    pub fn band(&self, lo_hz: f64, hi_hz: f64) -> Result<Self, SpectrogramError> {
        if !(lo_hz >= 0.0 && lo_hz <= hi_hz && hi_hz.is_finite()) {
            return Err(SpectrogramError::InvalidBand { lo_hz, hi_hz });
        }
        let keep: Vec<usize> = self
            .freqs
            .iter()
            .enumerate()
            .filter(|(_, &f)| f >= lo_hz && f <= hi_hz)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(SpectrogramError::EmptyBand { lo_hz, hi_hz });
        }
        Ok(Self {
            freqs: self.freqs.select(ndarray::Axis(0), &keep),
            times: self.times.clone(),
            power: self.power.select(ndarray::Axis(0), &keep),
            group: self.group,
            description: self.description.clone(),
        })
    }

    /// Mean power per frequency over all time bins.
    pub fn mean_over_time(&self) -> Array1<f64> {
        let mut out = Array1::<f64>::zeros(self.n_freqs());
        Zip::from(&mut out)
            .and(self.power.rows())
            .for_each(|o, row| *o = row.mean().unwrap_or(0.0));
        out
    }
}

// ── Windows ──────────────────────────────────────────────────────────────

/// DFT-even (periodic) window, as `scipy.signal.get_window` returns for
/// spectral analysis: the symmetric `n + 1` window with its last point dropped.
pub fn periodic_window(kind: WindowKind, n: usize) -> Vec<f64> {
    let m = n + 1;
    let mut w = match kind {
        WindowKind::Tukey { alpha } => tukey(m, alpha),
        WindowKind::Hann => cosine_window(m, 0.5, 0.5),
        WindowKind::Hamming => cosine_window(m, 0.54, 0.46),
    };
    w.truncate(n);
    w
}

fn cosine_window(m: usize, a0: f64, a1: f64) -> Vec<f64> {
    if m == 1 {
        return vec![1.0];
    }
    (0..m)
        .map(|i| a0 - a1 * (2.0 * PI * i as f64 / (m - 1) as f64).cos())
        .collect()
}

/// Symmetric Tukey window of length `m`.
fn tukey(m: usize, alpha: f64) -> Vec<f64> {
    if m == 1 {
        return vec![1.0];
    }
    if alpha <= 0.0 {
        return vec![1.0; m];
    }
    if alpha >= 1.0 {
        return cosine_window(m, 0.5, 0.5);
    }
    let denom = (m - 1) as f64;
    let width = (alpha * denom / 2.0).floor() as usize;
    (0..m)
        .map(|i| {
            let n = i as f64;
            if i <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * n / alpha / denom)).cos())
            } else if i < m - width - 1 {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * n / alpha / denom)).cos())
            }
        })
        .collect()
}
