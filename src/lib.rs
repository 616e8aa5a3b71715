//! # lbci: offline EEG classification for yes/no BCI sessions
//!
//! `lbci` turns a labelled continuous EEG recording into channel-averaged
//! spectrogram features and a binary yes/no classifier. Trials are found
//! through annotation descriptions of the form `"True-SSVEP-3"` /
//! `"False-LMI-i-12"`; the spectrogram numerics match
//! `scipy.signal.spectrogram` and the filters follow MNE-Python's FIR design.
//!
//! ## Pipeline overview
//!
//! ```text
//! session_raw.fif / .safetensors / SyntheticBoard
//!   │
//!   ├─ io::load_recording()          FIFF or safetensors → Recording
//!   ├─ preprocess()                  bad channels, band-pass, notches,
//!   │                                standardise, drop leading seconds
//!   ├─ extract_class_pair()          epochs per True-/False-<type>-*,
//!   │                                STFT per channel, channel mean
//!   ├─ assemble()                    trial-stratified train/test rows
//!   └─ fit_and_score()               linear SVM or LDA, accuracies,
//!                                    grouped k-fold, confusion matrix
//! ```
//!
//! [`FeatureMethod::Csp`] swaps the spectrogram features for the log power
//! of common spatial patterns fit on the training epochs (see [`csp`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use lbci::{io::load_recording, pipeline::run, PipelineConfig, TrialType};
//!
//! let rec = load_recording(std::path::Path::new("session_raw.fif"))?;
//! let report = run(&rec, TrialType::Ssvep, &PipelineConfig::default())?;
//! println!("train accuracy {:.3}", report.scores.train_accuracy);
//! if let Some(test) = report.scores.test_accuracy {
//!     println!("test accuracy  {test:.3}");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Running individual stages
//!
//! ```no_run
//! use lbci::{
//!     assemble, extract_class_pair, fit_and_score, preprocess, PipelineConfig, TrialType,
//! };
//! # fn demo(rec: &lbci::Recording) -> lbci::Result<()> {
//! let cfg = PipelineConfig::default();
//! let clean = preprocess(rec, &cfg.preprocess)?;
//! let pair = extract_class_pair(&clean, TrialType::Ssvep, cfg.window, &cfg.channels, &cfg.spectrogram)?;
//! let (yes, no) = pair.into_both()?;
//! let split = assemble(&yes, &no, &cfg.assemble)?;
//! let (_model, scores) = fit_and_score(&split.train, &split.test, &cfg.model, cfg.cv)?;
//! println!("{}", scores.confusion);
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod annotation;
pub mod classify;
pub mod config;
pub mod csp;
pub mod epoch;
pub mod error;
pub mod extract;
pub mod features;
pub mod fiff;
pub mod filter;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod recording;
pub mod spectrogram;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// data model
pub use annotation::{select, Annotation, AnnotationPattern, Response, TrialClass, TrialType};
pub use recording::Recording;

// config
pub use config::{
    AssembleConfig, CrossValidation, FeatureLayout, FeatureMethod, ModelKind, ModelParams, PipelineConfig,
    PreprocessConfig, SpectrogramParams, WindowKind,
};

// errors
pub use error::{
    AssemblyError, ClassifyError, DeviceError, EpochRangeError, LoadError, PipelineError,
    PreprocessError, Result, SpectrogramError,
};

// stages
pub use classify::{fit_and_score, Classifier, ConfusionMatrix, Scores, TrainedModel};
pub use csp::{fit_and_score_csp, Csp, CspModel};
pub use extract::{
    extract_class_epochs, extract_class_pair, extract_class_spectrograms, ClassData, ClassEpochs,
    ClassPair,
};
pub use features::{
    assemble, assemble_epochs, EpochSplit, LabeledEpochs, LabeledFeatureSet, TrainTestSplit,
};
pub use pipeline::{run, RunReport};
pub use preprocess::preprocess;
pub use spectrogram::{ChannelAveragedSpectrogram, Spectrogram, Stft};

// acquisition
pub use acquisition::{record_session, AcquisitionDevice, Montage, SyntheticBoard, TrialEvent};

// io
pub use io::{load_recording, save_recording, StWriter};
