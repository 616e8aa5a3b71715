//! Two-class linear discriminant analysis with ridge shrinkage.
//!
//! ```text
//! S   = pooled within-class covariance (denominator n − 2)
//! S_λ = (1 − λ) S + λ · tr(S)/p · I
//! w   = S_λ⁻¹ (μ₊ − μ₋)
//! b   = −wᵀ(μ₊ + μ₋)/2 + ln(n₊ / n₋)
//! ```
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView2, Axis};

use super::{binary_classes, Classifier, LinearModel};
use crate::error::ClassifyError;

#[derive(Debug, Clone, Default)]
pub struct Lda {
    /// In `[0, 1]`; `0` is plain Fisher LDA.
    pub shrinkage: f64,
    model: Option<LinearModel>,
}

impl Lda {
    pub fn new(shrinkage: f64) -> Self {
        Self { shrinkage: shrinkage.clamp(0.0, 1.0), model: None }
    }

    pub fn into_linear_model(self) -> Option<LinearModel> {
        self.model
    }
}

impl Classifier for Lda {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[i32]) -> Result<(), ClassifyError> {
        let classes = binary_classes(x, y)?;
        let (n, p) = x.dim();

        let rows_of = |label: i32| -> Vec<usize> {
            y.iter().enumerate().filter(|(_, &l)| l == label).map(|(i, _)| i).collect()
        };
        let neg = x.select(Axis(0), &rows_of(classes[0]));
        let pos = x.select(Axis(0), &rows_of(classes[1]));
        let mu_neg = neg.mean_axis(Axis(0)).ok_or(ClassifyError::EmptyTrainingSet)?;
        let mu_pos = pos.mean_axis(Axis(0)).ok_or(ClassifyError::EmptyTrainingSet)?;

        let centred_neg = &neg - &mu_neg;
        let centred_pos = &pos - &mu_pos;
        let scatter = centred_neg.t().dot(&centred_neg) + centred_pos.t().dot(&centred_pos);
        let dof = (n.saturating_sub(2)).max(1) as f64;
        let trace_mean = (0..p).map(|i| scatter[[i, i]]).sum::<f64>() / (p as f64 * dof);

        let lambda = self.shrinkage;
        let cov = DMatrix::<f64>::from_fn(p, p, |i, j| {
            let s = (1.0 - lambda) * scatter[[i, j]] / dof;
            if i == j { s + lambda * trace_mean } else { s }
        });
        let diff = DVector::<f64>::from_iterator(p, (&mu_pos - &mu_neg).into_iter());
        let w = cov.cholesky().ok_or(ClassifyError::Singular)?.solve(&diff);

        let weights = Array1::from_iter(w.iter().copied());
        let midpoint = (&mu_pos + &mu_neg) * 0.5;
        let prior = (pos.nrows() as f64 / neg.nrows() as f64).ln();
        let bias = -weights.dot(&midpoint) + prior;
        if !bias.is_finite() || weights.iter().any(|v| !v.is_finite()) {
            return Err(ClassifyError::Singular);
        }

        self.model = Some(LinearModel { weights, bias, classes });
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifyError> {
        self.model.as_ref().ok_or(ClassifyError::NotFitted)?.decision(x)
    }

    fn classes(&self) -> Option<[i32; 2]> {
        self.model.as_ref().map(|m| m.classes)
    }
}
