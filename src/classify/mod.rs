//! Binary classifiers and evaluation.
//!
//! - [`svm`]: L2-regularised hinge-loss linear SVM (dual coordinate descent).
//! - [`lda`]: two-class Fisher discriminant with shrinkage.
//! - [`scaler`]: per-feature standardisation fit on training rows.
//! - [`cv`]: grouped k-fold splitting.
//! - [`metrics`]: accuracy and confusion matrix.
//! - [`model`]: the persisted scaler + estimator bundle.
//!
//! Labels are arbitrary `i32`s; with classes sorted ascending the larger one
//! is the positive class, predicted when the decision value is `> 0`.
pub mod cv;
pub mod lda;
pub mod metrics;
pub mod model;
pub mod scaler;
pub mod svm;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{CrossValidation, ModelParams};
use crate::error::{ClassifyError, PipelineError};
use crate::features::LabeledFeatureSet;

pub use cv::group_k_fold;
pub use lda::Lda;
pub use metrics::{accuracy, ConfusionMatrix};
pub use model::TrainedModel;
pub use scaler::StandardScaler;
pub use svm::LinearSvm;

/// A fitted hyperplane `w·x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Array1<f64>,
    pub bias: f64,
    /// `[negative, positive]`.
    pub classes: [i32; 2],
}

impl LinearModel {
    pub fn decision(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifyError> {
        if x.ncols() != self.weights.len() {
            return Err(ClassifyError::FeatureWidth { expected: self.weights.len(), got: x.ncols() });
        }
        Ok(x.dot(&self.weights) + self.bias)
    }
}

/// Common interface of the binary estimators.
pub trait Classifier {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[i32]) -> Result<(), ClassifyError>;

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifyError>;

    /// `[negative, positive]` once fitted.
    fn classes(&self) -> Option<[i32; 2]>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<i32>, ClassifyError> {
        let [neg, pos] = self.classes().ok_or(ClassifyError::NotFitted)?;
        Ok(self
            .decision_function(x)?
            .iter()
            .map(|&d| if d > 0.0 { pos } else { neg })
            .collect())
    }

    /// Mean accuracy on `(x, y)`.
    fn score(&self, x: ArrayView2<f64>, y: &[i32]) -> Result<f64, ClassifyError> {
        Ok(accuracy(y, &self.predict(x)?))
    }
}

/// Validate a training set and return its two classes, ascending.
pub(crate) fn binary_classes(x: ArrayView2<f64>, y: &[i32]) -> Result<[i32; 2], ClassifyError> {
    if y.is_empty() || x.nrows() == 0 {
        return Err(ClassifyError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ClassifyError::FeatureWidth { expected: x.nrows(), got: y.len() });
    }
    let mut classes: Vec<i32> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    if let [neg, pos] = classes[..] {
        return Ok([neg, pos]);
    }
    Err(ClassifyError::NotBinary(classes))
}

/// Accuracies of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub train_accuracy: f64,
    /// `None` when the test partition is empty.
    pub test_accuracy: Option<f64>,
    /// One entry per fold; empty without cross-validation.
    pub cv_accuracies: Vec<f64>,
    /// On the test partition, or on the training partition if test is empty.
    pub confusion: ConfusionMatrix,
}

impl Scores {
    pub fn cv_mean(&self) -> Option<f64> {
        if self.cv_accuracies.is_empty() {
            None
        } else {
            Some(self.cv_accuracies.iter().sum::<f64>() / self.cv_accuracies.len() as f64)
        }
    }
}

/// Fit on `train`, score on both partitions, and optionally cross-validate
/// on `train` with group-respecting folds.
pub fn fit_and_score(
    train: &LabeledFeatureSet,
    test: &LabeledFeatureSet,
    params: &ModelParams,
    cv: Option<CrossValidation>,
) -> Result<(TrainedModel, Scores), PipelineError> {
    let mut cv_accuracies = Vec::new();
    if let Some(CrossValidation::GroupKFold { n_splits }) = cv {
        for (k, (fit_idx, val_idx)) in group_k_fold(&train.groups, n_splits)?.into_iter().enumerate() {
            let fit_set = train.select_rows(&fit_idx);
            let val_set = train.select_rows(&val_idx);
            let mut fold_model = TrainedModel::new(params.clone());
            fold_model.fit(fit_set.features.view(), &fit_set.labels)?;
            let acc = fold_model.score(val_set.features.view(), &val_set.labels)?;
            debug!(fold = k, rows = val_set.len(), accuracy = acc, "cv fold");
            cv_accuracies.push(acc);
        }
    }

    let mut model = TrainedModel::new(params.clone());
    model.fit(train.features.view(), &train.labels)?;
    let train_pred = model.predict(train.features.view())?;
    let train_accuracy = accuracy(&train.labels, &train_pred);

    let classes = model.classes().ok_or(ClassifyError::NotFitted)?;
    let (test_accuracy, confusion) = if test.is_empty() {
        (None, ConfusionMatrix::from_predictions(classes, &train.labels, &train_pred))
    } else {
        let pred = model.predict(test.features.view())?;
        let confusion = ConfusionMatrix::from_predictions(classes, &test.labels, &pred);
        (Some(accuracy(&test.labels, &pred)), confusion)
    };

    let scores = Scores { train_accuracy, test_accuracy, cv_accuracies, confusion };
    info!(
        train = scores.train_accuracy,
        test = ?scores.test_accuracy,
        cv_mean = ?scores.cv_mean(),
        "classifier scored"
    );
    Ok((model, scores))
}
