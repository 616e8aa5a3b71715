//! Fitted scaler + linear estimator, persisted as JSON.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Classifier, Lda, LinearModel, LinearSvm, StandardScaler};
use crate::config::{ModelKind, ModelParams};
use crate::error::ClassifyError;

/// The estimator chosen by [`ModelParams`], with optional feature scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub params: ModelParams,
    pub scaler: Option<StandardScaler>,
    pub linear: Option<LinearModel>,
}

impl TrainedModel {
    /// Unfitted model.
    pub fn new(params: ModelParams) -> Self {
        Self { params, scaler: None, linear: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.linear.is_some()
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifyError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ClassifyError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[i32]) -> Result<(), ClassifyError> {
        self.linear = if self.params.standardize {
            let scaler = StandardScaler::fit(x)?;
            let scaled = scaler.transform(x)?;
            self.scaler = Some(scaler);
            fit_linear(self.params.kind, scaled.view(), y)?
        } else {
            self.scaler = None;
            fit_linear(self.params.kind, x, y)?
        };
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifyError> {
        let linear = self.linear.as_ref().ok_or(ClassifyError::NotFitted)?;
        match &self.scaler {
            Some(s) => linear.decision(s.transform(x)?.view()),
            None => linear.decision(x),
        }
    }

    fn classes(&self) -> Option<[i32; 2]> {
        self.linear.as_ref().map(|m| m.classes)
    }
}

/// Fit the estimator named by `kind` and return its hyperplane.
fn fit_linear(
    kind: ModelKind,
    x: ArrayView2<f64>,
    y: &[i32],
) -> Result<Option<LinearModel>, ClassifyError> {
    Ok(match kind {
        ModelKind::LinearSvm { c, max_iter, tol } => {
            let mut svm = LinearSvm::new(c, max_iter, tol);
            svm.fit(x, y)?;
            svm.into_linear_model()
        }
        ModelKind::Lda { shrinkage } => {
            let mut lda = Lda::new(shrinkage);
            lda.fit(x, y)?;
            lda.into_linear_model()
        }
    })
}
