//! Column standardisation: `x' = (x − mean) / std`, population std.
//! Zero-variance columns get `std = 1` so they pass through centred.
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<f64>) -> Result<Self, ClassifyError> {
        let mean = x.mean_axis(Axis(0)).ok_or(ClassifyError::EmptyTrainingSet)?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        Ok(Self { mean, std })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ClassifyError> {
        if x.ncols() != self.mean.len() {
            return Err(ClassifyError::FeatureWidth { expected: self.mean.len(), got: x.ncols() });
        }
        Ok((&x - &self.mean) / &self.std)
    }
}
