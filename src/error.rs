//! Error taxonomy for the analysis pipeline.
//!
//! One enum per stage so callers can tell *where* a run failed, plus
//! [`PipelineError`] which wraps them for the end-to-end [`crate::pipeline::run`].
//! All of these are fatal to the current run; nothing is retried.
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a [`crate::Recording`] from a file or device buffer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("recording not found: {0}")]
    NotFound(PathBuf),
    #[error("unsupported recording format: {0} (expected .fif or .safetensors)")]
    UnsupportedFormat(PathBuf),
    #[error("malformed recording {path}: {source:#}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("inconsistent recording: {0}")]
    Inconsistent(String),
    #[error("acquisition device: {0}")]
    Device(#[from] DeviceError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Misuse of an [`crate::acquisition::AcquisitionDevice`] session.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device is already streaming")]
    AlreadyStreaming,
    #[error("device is not streaming")]
    NotStreaming,
    #[error("session {0} is not the active session")]
    StaleSession(u64),
    #[error("ring buffer must hold at least one sample")]
    EmptyBuffer,
}

/// Invalid filter or crop parameters.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("invalid band-pass ({low} Hz, {high} Hz): need 0 < low < high < {nyquist} Hz")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },
    #[error("invalid notch frequency {freq} Hz: need 0 < f < {nyquist} Hz")]
    InvalidNotch { freq: f64, nyquist: f64 },
    #[error("cannot drop {secs} s from a {duration} s recording")]
    InvalidCrop { secs: f64, duration: f64 },
    #[error("filtering failed: {0:#}")]
    Filter(anyhow::Error),
}

/// An epoch window that cannot be cut from the recording.
#[derive(Debug, Error)]
pub enum EpochRangeError {
    #[error("empty epoch window: tmin={tmin} s must be < tmax={tmax} s")]
    EmptyWindow { tmin: f64, tmax: f64 },
    #[error("epoch window bounds must be finite (tmin={tmin}, tmax={tmax})")]
    NonFiniteWindow { tmin: f64, tmax: f64 },
    #[error("annotation index {index} out of range ({n_annotations} annotations)")]
    NoSuchAnnotation { index: usize, n_annotations: usize },
    #[error(
        "epoch for annotation {index} ('{description}') spans {start:.3}..{end:.3} s, \
         outside the recording (0..{duration:.3} s)"
    )]
    OutOfBounds {
        index: usize,
        description: String,
        start: f64,
        end: f64,
        duration: f64,
    },
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("no channels selected")]
    NoChannels,
}

/// Spectrogram parameters or inputs that cannot produce a valid result.
#[derive(Debug, Error)]
pub enum SpectrogramError {
    #[error("overlap ({overlap}) must be smaller than window_len ({window_len})")]
    InvalidOverlap { window_len: usize, overlap: usize },
    #[error("window_len ({window_len}) exceeds epoch length ({n_samples} samples)")]
    WindowTooLong { window_len: usize, n_samples: usize },
    #[error("window_len must be at least 2 samples, got {0}")]
    WindowTooShort(usize),
    #[error("cannot average spectrograms with different axes: {0}")]
    AxisMismatch(String),
    #[error("flat buffer of {len} values does not match {n_freqs}x{n_times}")]
    FlatShape { len: usize, n_freqs: usize, n_times: usize },
    #[error("invalid feature band ({lo_hz} Hz, {hi_hz} Hz): need 0 <= lo <= hi")]
    InvalidBand { lo_hz: f64, hi_hz: f64 },
    #[error("feature band ({lo_hz} Hz, {hi_hz} Hz) contains no spectrogram frequency")]
    EmptyBand { lo_hz: f64, hi_hz: f64 },
}

/// Invalid inputs to the feature assembler or to a train/test split.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("train_fraction must be in (0, 1], got {0}")]
    InvalidTrainFraction(f64),
    #[error("class '{0}' has no epochs")]
    EmptyClass(String),
    #[error("only one class present: no annotations matched '{missing}'")]
    SingleClass { missing: String },
    #[error("group id {0} appears in more than one epoch")]
    DuplicateGroup(usize),
    #[error("feature width mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("{n_groups} groups cannot be split into {n_splits} folds")]
    TooFewGroups { n_groups: usize, n_splits: usize },
}

/// Classifier fitting / scoring failures.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("training set needs two classes, found labels {0:?}")]
    NotBinary(Vec<i32>),
    #[error("feature width {got} does not match the fitted model ({expected})")]
    FeatureWidth { expected: usize, got: usize },
    #[error("model used before fit")]
    NotFitted,
    #[error("singular scatter matrix; increase LDA shrinkage")]
    Singular,
    #[error("n_components must be in 1..={n_channels}, got {n_components}")]
    InvalidComponents { n_components: usize, n_channels: usize },
    #[error("model file error: {0}")]
    Persist(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any fatal error of an end-to-end run, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("load stage: {0}")]
    Load(#[from] LoadError),
    #[error("preprocess stage: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("epoching stage: {0}")]
    Epoch(#[from] EpochRangeError),
    #[error("spectrogram stage: {0}")]
    Spectrogram(#[from] SpectrogramError),
    #[error("feature assembly stage: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("classifier stage: {0}")]
    Classify(#[from] ClassifyError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
