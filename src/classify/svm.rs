//! Linear SVM, hinge loss, solved in the dual by coordinate descent
//! (Hsieh et al., ICML 2008).
//!
//! ```text
//! min_α  ½ αᵀQα − eᵀα     s.t. 0 ≤ α_i ≤ C,   Q_ij = y_i y_j x̄_iᵀx̄_j
//! w = Σ α_i y_i x̄_i,      x̄ = [x, 1]   (bias folded into w)
//! ```
//!
//! Each sweep visits the coordinates in a seeded random order; iteration stops
//! once the spread of the projected gradient drops below `tol`.
use ndarray::{Array1, ArrayView2};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, warn};

use super::{binary_classes, Classifier, LinearModel};
use crate::error::ClassifyError;

#[derive(Debug, Clone)]
pub struct LinearSvm {
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    model: Option<LinearModel>,
}

impl LinearSvm {
    pub fn new(c: f64, max_iter: usize, tol: f64) -> Self {
        Self { c, max_iter, tol, model: None }
    }

    pub fn linear_model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }

    pub fn into_linear_model(self) -> Option<LinearModel> {
        self.model
    }
}

impl Default for LinearSvm {
    fn default() -> Self {
        Self::new(0.01, 1000, 1e-4)
    }
}

impl Classifier for LinearSvm {
    fn fit(&mut self, x: ArrayView2<f64>, y: &[i32]) -> Result<(), ClassifyError> {
        let classes = binary_classes(x, y)?;
        let (n, p) = x.dim();
        let sign: Vec<f64> = y.iter().map(|&l| if l == classes[1] { 1.0 } else { -1.0 }).collect();

        // Augmented weights: w[..p] features, w[p] bias.
        let mut w = vec![0.0_f64; p + 1];
        let mut alpha = vec![0.0_f64; n];
        let q_diag: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r) + 1.0).collect();

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let mut converged = false;
        let mut iter = 0;
        while iter < self.max_iter {
            order.shuffle(&mut rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;
            for &i in &order {
                let xi = x.row(i);
                let wx = xi.iter().zip(&w[..p]).map(|(a, b)| a * b).sum::<f64>() + w[p];
                let g = sign[i] * wx - 1.0;
                let pg = if alpha[i] <= 0.0 {
                    g.min(0.0)
                } else if alpha[i] >= self.c {
                    g.max(0.0)
                } else {
                    g
                };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);
                if pg.abs() > 1e-12 {
                    let old = alpha[i];
                    alpha[i] = (old - g / q_diag[i]).clamp(0.0, self.c);
                    let delta = (alpha[i] - old) * sign[i];
                    for (wj, &xij) in w[..p].iter_mut().zip(xi.iter()) {
                        *wj += delta * xij;
                    }
                    w[p] += delta;
                }
            }
            iter += 1;
            if pg_max - pg_min < self.tol {
                converged = true;
                break;
            }
        }
        if converged {
            debug!(iter, "svm converged");
        } else {
            warn!(max_iter = self.max_iter, "svm reached max_iter without converging");
        }

        let bias = w[p];
        w.truncate(p);
        self.model = Some(LinearModel { weights: Array1::from(w), bias, classes });
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, ClassifyError> {
        self.model.as_ref().ok_or(ClassifyError::NotFitted)?.decision(x)
    }

    fn classes(&self) -> Option<[i32; 2]> {
        self.model.as_ref().map(|m| m.classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn blobs() -> (Array2<f64>, Vec<i32>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let jitter = (i as f64 * 0.731).sin() * 0.3;
            let (cx, label) = if i % 2 == 0 { (2.0, 1) } else { (-2.0, 0) };
            rows.extend([cx + jitter, 0.5 * jitter]);
            y.push(label);
        }
        (Array2::from_shape_vec((40, 2), rows).unwrap(), y)
    }

    #[test]
    fn separates_linearly_separable_blobs() {
        let (x, y) = blobs();
        let mut svm = LinearSvm::new(1.0, 1000, 1e-6);
        svm.fit(x.view(), &y).unwrap();
        approx::assert_abs_diff_eq!(svm.score(x.view(), &y).unwrap(), 1.0);
        let m = svm.linear_model().unwrap();
        assert!(m.weights[0] > 0.0);
    }

    #[test]
    fn strong_regularisation_shrinks_weights() {
        let (x, y) = blobs();
        let mut loose = LinearSvm::new(10.0, 2000, 1e-6);
        let mut tight = LinearSvm::new(0.001, 2000, 1e-6);
        loose.fit(x.view(), &y).unwrap();
        tight.fit(x.view(), &y).unwrap();
        let norm = |s: &LinearSvm| s.linear_model().unwrap().weights.dot(&s.linear_model().unwrap().weights);
        assert!(norm(&tight) < norm(&loose));
    }

    #[test]
    fn arbitrary_labels() {
        let (x, y) = blobs();
        let y: Vec<i32> = y.iter().map(|&l| if l == 1 { 7 } else { -3 }).collect();
        let mut svm = LinearSvm::new(1.0, 1000, 1e-6);
        svm.fit(x.view(), &y).unwrap();
        assert_eq!(svm.classes(), Some([-3, 7]));
        assert_eq!(svm.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn predict_before_fit() {
        let svm = LinearSvm::default();
        assert!(matches!(
            svm.predict(Array2::<f64>::zeros((1, 2)).view()),
            Err(ClassifyError::NotFitted)
        ));
    }
}
