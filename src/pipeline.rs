//! End-to-end run for one trial type.
//!
//! ```text
//! Recording
//!   ├─ preprocess            band-pass, notches, bad channels, crop
//!   ├─ extract_class_pair    True-<type>-* / False-<type>-* spectrograms
//!   ├─ band                  optional frequency restriction
//!   ├─ assemble              stratified trial split, feature rows
//!   └─ fit_and_score         classifier + accuracies (+ grouped CV)
//! ```
//!
//! With [`FeatureMethod::Csp`] the spectrogram steps are replaced:
//!
//! ```text
//!   ├─ extract_class_epochs  raw True-/False-<type>-* epochs
//!   ├─ assemble_epochs       same stratified trial split
//!   └─ fit_and_score_csp     spatial filters + classifier on log power
//! ```
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotation::{Response, TrialClass, TrialType};
use crate::classify::{fit_and_score, Scores, TrainedModel};
use crate::config::{FeatureMethod, PipelineConfig};
use crate::csp::{fit_and_score_csp, Csp};
use crate::error::{AssemblyError, PipelineError, SpectrogramError};
use crate::extract::{extract_class_epochs, extract_class_pair, ClassEpochs};
use crate::features::{assemble, assemble_epochs};
use crate::preprocess::preprocess;
use crate::recording::Recording;
use crate::spectrogram::ChannelAveragedSpectrogram;

/// Outcome of [`run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub trial_type: TrialType,
    /// Epochs matching `True-<type>-*`.
    pub yes_epochs: usize,
    /// Epochs matching `False-<type>-*`.
    pub no_epochs: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_features: usize,
    pub scores: Scores,
    pub model: TrainedModel,
    /// Spatial filters feeding `model`; `None` for spectrogram features.
    pub csp: Option<Csp>,
}

/// Preprocess `recording`, extract both classes of `trial_type`, assemble
/// features and fit the configured model.
///
/// The "yes" class takes `cfg.assemble.labels.0`, the "no" class `.1`.
pub fn run(
    recording: &Recording,
    trial_type: TrialType,
    cfg: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    let clean = preprocess(recording, &cfg.preprocess)?;
    if let FeatureMethod::Csp { n_components } = cfg.method {
        return run_csp(&clean, trial_type, n_components, cfg);
    }
    let pair = extract_class_pair(&clean, trial_type, cfg.window, &cfg.channels, &cfg.spectrogram)?;
    let (mut yes, mut no) = pair.into_both()?;

    if let Some((lo, hi)) = cfg.freq_band {
        restrict_band(&mut yes, lo, hi)?;
        restrict_band(&mut no, lo, hi)?;
    }

    let split = assemble(&yes, &no, &cfg.assemble)?;
    let (model, scores) = fit_and_score(&split.train, &split.test, &cfg.model, cfg.cv)?;

    let report = RunReport {
        trial_type,
        yes_epochs: yes.len(),
        no_epochs: no.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        n_features: split.train.n_features(),
        scores,
        model,
        csp: None,
    };
    info!(
        %trial_type,
        yes = report.yes_epochs,
        no = report.no_epochs,
        train_rows = report.train_rows,
        test_rows = report.test_rows,
        "pipeline finished"
    );
    Ok(report)
}

fn run_csp(
    clean: &Recording,
    trial_type: TrialType,
    n_components: usize,
    cfg: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    let side = |response| -> Result<ClassEpochs, PipelineError> {
        let pattern = TrialClass::new(response, trial_type).pattern();
        let epochs = extract_class_epochs(clean, &pattern, cfg.window, &cfg.channels)?;
        if epochs.is_empty() {
            return Err(AssemblyError::SingleClass { missing: pattern.to_string() }.into());
        }
        Ok(epochs)
    };
    let yes = side(Response::Yes)?;
    let no = side(Response::No)?;

    let split = assemble_epochs(&yes, &no, &cfg.assemble)?;
    let (fitted, scores) =
        fit_and_score_csp(&split.train, &split.test, n_components, &cfg.model, cfg.cv)?;

    let report = RunReport {
        trial_type,
        yes_epochs: yes.len(),
        no_epochs: no.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        n_features: n_components,
        scores,
        model: fitted.model,
        csp: Some(fitted.csp),
    };
    info!(
        %trial_type,
        yes = report.yes_epochs,
        no = report.no_epochs,
        n_components,
        "csp pipeline finished"
    );
    Ok(report)
}

fn restrict_band(
    specs: &mut [ChannelAveragedSpectrogram],
    lo: f64,
    hi: f64,
) -> Result<(), SpectrogramError> {
    for s in specs.iter_mut() {
        *s = s.band(lo, hi)?;
    }
    Ok(())
}
