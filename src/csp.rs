//! Common spatial patterns for two-class band-power problems.
//!
//! Filters solve the generalised eigenproblem
//!
//! ```text
//! C₋ w = λ (C₋ + C₊) w,     wᵀ (C₋ + C₊) w = 1
//! ```
//!
//! where `C₋`/`C₊` are the channel covariances of each class over all of its
//! training samples, demeaned per channel. Filters are ranked by `|λ − 0.5|`,
//! largest first, so both ends of the spectrum are taken before the middle.
//! An epoch's features are `ln(mean(s²))` of each filtered source `s = wᵀx`.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::{binary_classes, fit_and_score, group_k_fold, Classifier, Scores, TrainedModel};
use crate::config::{CrossValidation, ModelParams};
use crate::error::{ClassifyError, PipelineError};
use crate::features::{LabeledEpochs, LabeledFeatureSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Csp {
    pub n_components: usize,
    /// `[n_components, n_channels]`, one spatial filter per row.
    filters: Option<Array2<f64>>,
    /// Eigenvalue of each kept filter.
    eigenvalues: Option<Array1<f64>>,
}

impl Csp {
    pub fn new(n_components: usize) -> Self {
        Self { n_components, filters: None, eigenvalues: None }
    }

    pub fn filters(&self) -> Option<&Array2<f64>> {
        self.filters.as_ref()
    }

    pub fn eigenvalues(&self) -> Option<&Array1<f64>> {
        self.eigenvalues.as_ref()
    }

    /// Fit the spatial filters on `[E, C, n]` epochs labelled by `y`.
    pub fn fit(&mut self, epochs: ArrayView3<f64>, y: &[i32]) -> Result<(), ClassifyError> {
        let (n_epochs, n_channels, _) = epochs.dim();
        if n_epochs != y.len() {
            return Err(ClassifyError::FeatureWidth { expected: n_epochs, got: y.len() });
        }
        if self.n_components == 0 || self.n_components > n_channels {
            return Err(ClassifyError::InvalidComponents {
                n_components: self.n_components,
                n_channels,
            });
        }
        // Zero-width rows: only the labels are checked.
        let classes = binary_classes(Array2::<f64>::zeros((n_epochs, 0)).view(), y)?;

        let rows_of = |label: i32| -> Vec<usize> {
            y.iter().enumerate().filter(|(_, &l)| l == label).map(|(i, _)| i).collect()
        };
        let cov_neg = class_covariance(epochs, &rows_of(classes[0]));
        let cov_pos = class_covariance(epochs, &rows_of(classes[1]));

        let composite = &cov_neg + &cov_pos;
        let l = composite.cholesky().ok_or(ClassifyError::Singular)?.l();
        let l_inv = l.try_inverse().ok_or(ClassifyError::Singular)?;
        let whitened = &l_inv * &cov_neg * l_inv.transpose();
        let eig = ((&whitened + whitened.transpose()) * 0.5).symmetric_eigen();
        let vectors = l_inv.transpose() * &eig.eigenvectors;

        let mut order: Vec<usize> = (0..n_channels).collect();
        let spread = |i: usize| (eig.eigenvalues[i] - 0.5).abs();
        order.sort_by(|&a, &b| spread(b).total_cmp(&spread(a)));
        order.truncate(self.n_components);

        let filters = Array2::from_shape_fn((self.n_components, n_channels), |(k, c)| {
            vectors[(c, order[k])]
        });
        if filters.iter().any(|v| !v.is_finite()) {
            return Err(ClassifyError::Singular);
        }
        let eigenvalues: Array1<f64> = order.iter().map(|&i| eig.eigenvalues[i]).collect();
        debug!(eigenvalues = ?eigenvalues.to_vec(), "csp filters");
        self.filters = Some(filters);
        self.eigenvalues = Some(eigenvalues);
        Ok(())
    }

    /// `[E, n_components]` log mean power of the filtered epochs.
    pub fn transform(&self, epochs: ArrayView3<f64>) -> Result<Array2<f64>, ClassifyError> {
        let filters = self.filters.as_ref().ok_or(ClassifyError::NotFitted)?;
        let n_channels = epochs.dim().1;
        if n_channels != filters.ncols() {
            return Err(ClassifyError::FeatureWidth { expected: filters.ncols(), got: n_channels });
        }
        let mut out = Array2::zeros((epochs.dim().0, filters.nrows()));
        for (mut row, epoch) in out.rows_mut().into_iter().zip(epochs.outer_iter()) {
            let sources = filters.dot(&epoch);
            for (v, s) in row.iter_mut().zip(sources.rows()) {
                *v = s.mapv(|x| x * x).mean().unwrap_or(0.0).ln();
            }
        }
        Ok(out)
    }
}

/// Sample covariance over the concatenated samples of `rows`.
fn class_covariance(epochs: ArrayView3<f64>, rows: &[usize]) -> DMatrix<f64> {
    let n_channels = epochs.dim().1;
    let mut scatter = Array2::<f64>::zeros((n_channels, n_channels));
    let mut sum = Array1::<f64>::zeros(n_channels);
    let mut n = 0_usize;
    for &e in rows {
        let x = epochs.index_axis(Axis(0), e);
        scatter += &x.dot(&x.t());
        sum += &x.sum_axis(Axis(1));
        n += x.ncols();
    }
    let n = n as f64;
    let mean = sum / n.max(1.0);
    let dof = (n - 1.0).max(1.0);
    DMatrix::from_fn(n_channels, n_channels, |i, j| (scatter[[i, j]] - n * mean[i] * mean[j]) / dof)
}

/// Fitted spatial filters and the classifier on their log-power features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CspModel {
    pub csp: Csp,
    pub model: TrainedModel,
}

impl CspModel {
    pub fn save(&self, path: &Path) -> Result<(), ClassifyError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "csp model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn predict(&self, epochs: ArrayView3<f64>) -> Result<Vec<i32>, ClassifyError> {
        self.model.predict(self.csp.transform(epochs)?.view())
    }
}

fn features_of(csp: &Csp, set: &LabeledEpochs) -> Result<LabeledFeatureSet, ClassifyError> {
    if set.is_empty() {
        return Ok(LabeledFeatureSet::empty(csp.n_components));
    }
    Ok(LabeledFeatureSet {
        features: csp.transform(set.data.view())?,
        labels: set.labels.clone(),
        groups: set.groups.clone(),
    })
}

/// Fit CSP and the classifier on `train`, score both partitions, and
/// optionally cross-validate on `train`. Every fold refits its own filters.
pub fn fit_and_score_csp(
    train: &LabeledEpochs,
    test: &LabeledEpochs,
    n_components: usize,
    params: &ModelParams,
    cv: Option<CrossValidation>,
) -> Result<(CspModel, Scores), PipelineError> {
    let mut cv_accuracies = Vec::new();
    if let Some(CrossValidation::GroupKFold { n_splits }) = cv {
        for (k, (fit_idx, val_idx)) in group_k_fold(&train.groups, n_splits)?.into_iter().enumerate() {
            let fit_set = train.select(&fit_idx);
            let val_set = train.select(&val_idx);
            let mut csp = Csp::new(n_components);
            csp.fit(fit_set.data.view(), &fit_set.labels)?;
            let mut model = TrainedModel::new(params.clone());
            model.fit(csp.transform(fit_set.data.view())?.view(), &fit_set.labels)?;
            let acc = model.score(csp.transform(val_set.data.view())?.view(), &val_set.labels)?;
            debug!(fold = k, epochs = val_set.len(), accuracy = acc, "csp cv fold");
            cv_accuracies.push(acc);
        }
    }

    let mut csp = Csp::new(n_components);
    csp.fit(train.data.view(), &train.labels)?;
    let (model, mut scores) =
        fit_and_score(&features_of(&csp, train)?, &features_of(&csp, test)?, params, None)?;
    scores.cv_accuracies = cv_accuracies;
    info!(n_components, cv_mean = ?scores.cv_mean(), "csp model fitted");
    Ok((CspModel { csp, model }, scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelKind;
    use ndarray::Array3;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::TAU;

    /// Two sources, 10 Hz and 22 Hz, mixed into four channels. Label 1 has a
    /// strong first source, label 0 a strong second one.
    fn two_source_epochs(n_epochs: usize, seed: u64) -> (Array3<f64>, Vec<i32>) {
        let mixing = [[1.0, 0.4], [0.3, 1.0], [0.8, 0.7], [0.1, 0.5]];
        let (n_t, sfreq) = (200, 100.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Array3::zeros((n_epochs, 4, n_t));
        let mut y = Vec::with_capacity(n_epochs);
        for e in 0..n_epochs {
            let label = (e % 2) as i32;
            let (a1, a2) = if label == 1 { (3.0, 0.5) } else { (0.5, 3.0) };
            let (p1, p2): (f64, f64) = (rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU));
            for t in 0..n_t {
                let time = t as f64 / sfreq;
                let s = [a1 * (TAU * 10.0 * time + p1).sin(), a2 * (TAU * 22.0 * time + p2).sin()];
                for (ch, m) in mixing.iter().enumerate() {
                    data[[e, ch, t]] = m[0] * s[0] + m[1] * s[1] + 0.2 * rng.gen_range(-1.0..1.0);
                }
            }
            y.push(label);
        }
        (data, y)
    }

    fn lda() -> ModelParams {
        ModelParams { kind: ModelKind::Lda { shrinkage: 0.0 }, standardize: false }
    }

    fn labelled(data: Array3<f64>, labels: Vec<i32>) -> LabeledEpochs {
        let groups = (0..labels.len()).collect();
        LabeledEpochs { data, labels, groups }
    }

    #[test]
    fn log_power_separates_two_sources() {
        let (x, y) = two_source_epochs(60, 1);
        let train = labelled(x.slice(ndarray::s![..40, .., ..]).to_owned(), y[..40].to_vec());
        let test = labelled(x.slice(ndarray::s![40.., .., ..]).to_owned(), y[40..].to_vec());

        let (model, scores) = fit_and_score_csp(&train, &test, 2, &lda(), None).unwrap();
        assert!(scores.train_accuracy > 0.95);
        assert!(scores.test_accuracy.unwrap() > 0.95);
        assert_eq!(model.predict(test.data.view()).unwrap().len(), 20);
    }

    #[test]
    fn filters_are_ranked_and_normalised() {
        let (x, y) = two_source_epochs(40, 7);
        let mut csp = Csp::new(4);
        csp.fit(x.view(), &y).unwrap();

        let idx_neg: Vec<usize> = (0..40).filter(|i| y[*i] == 0).collect();
        let idx_pos: Vec<usize> = (0..40).filter(|i| y[*i] == 1).collect();
        let c_neg = class_covariance(x.view(), &idx_neg);
        let composite = &c_neg + class_covariance(x.view(), &idx_pos);

        let filters = csp.filters().unwrap();
        let eigenvalues = csp.eigenvalues().unwrap();
        for (k, w) in filters.rows().into_iter().enumerate() {
            let w = nalgebra::DVector::from_iterator(4, w.iter().copied());
            approx::assert_abs_diff_eq!((w.transpose() * &composite * &w)[(0, 0)], 1.0, epsilon = 1e-9);
            approx::assert_abs_diff_eq!(
                (w.transpose() * &c_neg * &w)[(0, 0)],
                eigenvalues[k],
                epsilon = 1e-9
            );
        }
        let spread: Vec<f64> = eigenvalues.iter().map(|l| (l - 0.5).abs()).collect();
        assert!(spread.windows(2).all(|p| p[0] >= p[1]));
        // One source per class dominates: both ends of the spectrum come first.
        assert!(spread[1] > 0.3);
    }

    #[test]
    fn saved_model_predicts_identically() {
        let (x, y) = two_source_epochs(20, 9);
        let train = labelled(x, y);
        let empty = labelled(Array3::zeros((0, 4, 200)), vec![]);
        let (model, _) = fit_and_score_csp(&train, &empty, 2, &lda(), None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csp.json");
        model.save(&path).unwrap();
        let loaded = CspModel::load(&path).unwrap();
        assert_eq!(loaded.predict(train.data.view()).unwrap(), model.predict(train.data.view()).unwrap());
    }

    #[test]
    fn cross_validation_refits_per_fold() {
        let (x, y) = two_source_epochs(30, 3);
        let train = labelled(x, y);
        let empty = labelled(Array3::zeros((0, 4, 200)), vec![]);
        let cv = Some(CrossValidation::GroupKFold { n_splits: 5 });
        let (_, scores) = fit_and_score_csp(&train, &empty, 2, &lda(), cv).unwrap();
        assert_eq!(scores.cv_accuracies.len(), 5);
        assert!(scores.cv_mean().unwrap() > 0.9);
        assert!(scores.test_accuracy.is_none());
    }

    #[test]
    fn component_count_is_checked() {
        let (x, y) = two_source_epochs(10, 0);
        for n in [0, 5] {
            assert!(matches!(
                Csp::new(n).fit(x.view(), &y),
                Err(ClassifyError::InvalidComponents { n_channels: 4, .. })
            ));
        }
    }

    #[test]
    fn transform_needs_fit_and_matching_channels() {
        let (x, y) = two_source_epochs(10, 0);
        let mut csp = Csp::new(2);
        assert!(matches!(csp.transform(x.view()), Err(ClassifyError::NotFitted)));
        csp.fit(x.view(), &y).unwrap();
        let three = x.slice(ndarray::s![.., ..3, ..]);
        assert!(matches!(
            csp.transform(three),
            Err(ClassifyError::FeatureWidth { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn single_class_is_rejected() {
        let (x, _) = two_source_epochs(6, 0);
        assert!(matches!(
            Csp::new(2).fit(x.view(), &[1; 6]),
            Err(ClassifyError::NotBinary(_))
        ));
    }
}
