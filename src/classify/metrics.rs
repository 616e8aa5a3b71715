use std::fmt;

use serde::{Deserialize, Serialize};

/// Fraction of positions where `y_true == y_pred`; `0.0` for empty input.
pub fn accuracy(y_true: &[i32], y_pred: &[i32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true.iter().zip(y_pred).filter(|(a, b)| a == b).count();
    hits as f64 / y_true.len() as f64
}

/// 2×2 counts, rows = true class, columns = predicted class, both ordered
/// `[negative, positive]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: [i32; 2],
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Labels outside `classes` are not counted.
    pub fn from_predictions(classes: [i32; 2], y_true: &[i32], y_pred: &[i32]) -> Self {
        let pos = |l: i32| classes.iter().position(|&c| c == l);
        let mut counts = [[0; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if let (Some(i), Some(j)) = (pos(t), pos(p)) {
                counts[i][j] += 1;
            }
        }
        Self { classes, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            n => (self.counts[0][0] + self.counts[1][1]) as f64 / n as f64,
        }
    }

    /// True-positive rate of the positive class.
    pub fn sensitivity(&self) -> f64 {
        ratio(self.counts[1][1], self.counts[1][0] + self.counts[1][1])
    }

    /// True-negative rate.
    pub fn specificity(&self) -> f64 {
        ratio(self.counts[0][0], self.counts[0][0] + self.counts[0][1])
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [neg, pos] = self.classes;
        writeln!(f, "{:>10} {:>8} {:>8}", "true\\pred", neg, pos)?;
        writeln!(f, "{:>10} {:>8} {:>8}", neg, self.counts[0][0], self.counts[0][1])?;
        write!(f, "{:>10} {:>8} {:>8}", pos, self.counts[1][0], self.counts[1][1])
    }
}
