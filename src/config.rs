//! Analysis configuration.
//!
//! Every stage takes a plain struct with `pub` fields and a `Default` that
//! reproduces the lab's standard SSVEP analysis, so callers can override a
//! few fields with struct-update syntax:
//!
//! ```
//! use lbci::{PipelineConfig, PreprocessConfig};
//!
//! let cfg = PipelineConfig {
//!     preprocess: PreprocessConfig {
//!         notch_freqs: vec![60.0],   // mains rejection
//!         ..PreprocessConfig::default()
//!     },
//!     channels: vec!["C3".into(), "C4".into()],
//!     ..PipelineConfig::default()
//! };
//! assert_eq!(cfg.spectrogram.window_len, 125);
//! ```
//!
//! All structs are `serde`-enabled with `#[serde(default)]`, so a JSON file
//! only needs the fields that differ from the defaults.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Preprocessing ────────────────────────────────────────────────────────

/// Filtering and cropping applied to the whole continuous recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// `(low_hz, high_hz)` pass band of the zero-phase FIR.
    ///
    /// Default: `(5.0, 50.0)` Hz.
    pub band_pass: (f64, f64),

    /// Frequencies to notch out after band-passing, e.g. `[60.0, 120.0]`.
    ///
    /// Default: `[]`.
    pub notch_freqs: Vec<f64>,

    /// Seconds discarded from the start of the recording once filtered.
    /// Removes the filter start-up transient and headset warm-up.
    ///
    /// Default: `2.0` s.
    pub drop_leading_secs: f64,

    /// Channels zero-filled before filtering (case and space insensitive).
    ///
    /// Default: `[]`.
    pub bad_channels: Vec<String>,

    /// Standardise each channel to zero mean, unit variance after filtering.
    ///
    /// Default: `false`.
    pub standardize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            band_pass: (5.0, 50.0),
            notch_freqs: vec![],
            drop_leading_secs: 2.0,
            bad_channels: vec![],
            standardize: false,
        }
    }
}

// ── Spectrogram ──────────────────────────────────────────────────────────

/// Taper applied to each STFT segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowKind {
    /// Tapered cosine; `alpha = 0` is rectangular, `alpha = 1` is Hann.
    Tukey { alpha: f64 },
    Hann,
    Hamming,
}

impl Default for WindowKind {
    fn default() -> Self {
        Self::Tukey { alpha: 0.25 }
    }
}

/// Short-time Fourier parameters, in samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramParams {
    /// Samples per segment. At 125 Hz the default gives 1 Hz resolution.
    ///
    /// Default: `125`.
    pub window_len: usize,

    /// Samples shared by consecutive segments; must be `< window_len`.
    ///
    /// Default: `115`.
    pub overlap: usize,

    /// Default: Tukey, `alpha = 0.25`.
    pub window: WindowKind,

    /// Subtract each segment's mean before the FFT.
    ///
    /// Default: `true`.
    pub detrend: bool,
}

impl Default for SpectrogramParams {
    fn default() -> Self {
        Self { window_len: 125, overlap: 115, window: WindowKind::default(), detrend: true }
    }
}

impl SpectrogramParams {
    /// Hop between segment starts.
    #[inline]
    pub fn step(&self) -> usize {
        self.window_len.saturating_sub(self.overlap)
    }

    /// Time bins produced for `n_samples`; trailing partial frames are dropped.
    pub fn n_time_bins(&self, n_samples: usize) -> usize {
        if self.overlap >= self.window_len || n_samples < self.window_len {
            return 0;
        }
        (n_samples - self.overlap) / self.step()
    }

    /// Frequency bins of the one-sided spectrum.
    #[inline]
    pub fn n_freq_bins(&self) -> usize {
        self.window_len / 2 + 1
    }
}

// ── Feature assembly ─────────────────────────────────────────────────────

/// How a spectrogram becomes feature rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLayout {
    /// One row per time bin, one feature per frequency bin.
    #[default]
    PerTimeBin,
    /// One row per epoch holding the whole frequency × time matrix.
    FlattenedEpoch,
}

/// Train/test split settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleConfig {
    /// Fraction of *trials* per class placed in the training partition.
    ///
    /// Default: `0.8`.
    pub train_fraction: f64,

    /// Default: [`FeatureLayout::PerTimeBin`].
    pub layout: FeatureLayout,

    /// Target values for `(class_a, class_b)`.
    ///
    /// Default: `(1, 0)`.
    pub labels: (i32, i32),

    /// Seed for the trial shuffle; equal seeds give equal splits.
    ///
    /// Default: `0`.
    pub seed: u64,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self { train_fraction: 0.8, layout: FeatureLayout::PerTimeBin, labels: (1, 0), seed: 0 }
    }
}

// ── Classifier ───────────────────────────────────────────────────────────

/// Estimator family and its hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    /// L2-regularised hinge-loss linear SVM.
    LinearSvm { c: f64, max_iter: usize, tol: f64 },
    /// Two-class Fisher discriminant with ridge shrinkage in `[0, 1]`.
    Lda { shrinkage: f64 },
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::LinearSvm { c: 0.01, max_iter: 1000, tol: 1e-4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub kind: ModelKind,
    /// Scale features with mean/std fit on the training rows.
    ///
    /// Default: `true`.
    pub standardize: bool,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { kind: ModelKind::default(), standardize: true }
    }
}

/// Cross-validation scheme run on the training partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossValidation {
    /// K folds, never splitting a group across folds.
    GroupKFold { n_splits: usize },
}

// ── Feature method ───────────────────────────────────────────────────────

/// What the classifier is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureMethod {
    /// Channel-averaged spectrogram rows, see [`AssembleConfig::layout`].
    #[default]
    Spectrogram,
    /// Log mean power of `n_components` common spatial patterns fit on the
    /// training epochs. The band comes from [`PreprocessConfig::band_pass`].
    Csp { n_components: usize },
}

// ── Whole pipeline ───────────────────────────────────────────────────────

/// Configuration for [`crate::pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,

    /// `(tmin, tmax)` seconds relative to each annotation onset.
    ///
    /// Default: `(0.0, 5.0)`.
    pub window: (f64, f64),

    /// Channels averaged into each spectrogram.
    ///
    /// Default: occipital/parietal `O1, O2, P3, P4`.
    pub channels: Vec<String>,

    /// Default: [`FeatureMethod::Spectrogram`].
    pub method: FeatureMethod,

    pub spectrogram: SpectrogramParams,

    /// Keep only spectrogram rows inside `(lo_hz, hi_hz)` as features.
    ///
    /// Default: `None` (all bins).
    pub freq_band: Option<(f64, f64)>,

    pub assemble: AssembleConfig,

    pub model: ModelParams,

    /// Default: `None`.
    pub cv: Option<CrossValidation>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            window: (0.0, 5.0),
            channels: ["O1", "O2", "P3", "P4"].iter().map(|s| s.to_string()).collect(),
            method: FeatureMethod::Spectrogram,
            spectrogram: SpectrogramParams::default(),
            freq_band: None,
            assemble: AssembleConfig::default(),
            model: ModelParams::default(),
            cv: None,
        }
    }
}

impl PipelineConfig {
    /// Motor-imagery preset: 7-30 Hz band-pass, four CSP components and
    /// unshrunk LDA on the log-power features.
    pub fn csp_lda(channels: Vec<String>) -> Self {
        Self {
            preprocess: PreprocessConfig { band_pass: (7.0, 30.0), ..PreprocessConfig::default() },
            channels,
            method: FeatureMethod::Csp { n_components: 4 },
            model: ModelParams { kind: ModelKind::Lda { shrinkage: 0.0 }, standardize: false },
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid pipeline configuration")
    }

    /// Read a (possibly partial) JSON configuration file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&text)
    }
}
