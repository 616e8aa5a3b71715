//! Labelled feature matrices, raw epoch sets, and the trial-level
//! train/test split shared by both.
//!
//! Rows never mix trials: every row carries the group id of the epoch it was
//! cut from, and the split assigns whole groups to one side.
use std::collections::{BTreeSet, HashSet};

use ndarray::{Array2, Array3, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{AssembleConfig, FeatureLayout};
use crate::error::AssemblyError;
use crate::extract::ClassEpochs;
use crate::spectrogram::ChannelAveragedSpectrogram;

/// `[rows, n_features]` matrix with one label and one group id per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledFeatureSet {
    pub features: Array2<f64>,
    pub labels: Vec<i32>,
    pub groups: Vec<usize>,
}

impl LabeledFeatureSet {
    pub fn empty(n_features: usize) -> Self {
        Self { features: Array2::zeros((0, n_features)), labels: vec![], groups: vec![] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Distinct group ids, ascending.
    pub fn unique_groups(&self) -> Vec<usize> {
        self.groups.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// New set holding only `rows`, in that order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
            groups: rows.iter().map(|&r| self.groups[r]).collect(),
        }
    }
}

/// Training and held-out partitions. No group id appears in both.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: LabeledFeatureSet,
    pub test: LabeledFeatureSet,
}

/// Feature width of one epoch under `layout`.
fn width(spec: &ChannelAveragedSpectrogram, layout: FeatureLayout) -> usize {
    match layout {
        FeatureLayout::PerTimeBin => spec.n_freqs(),
        FeatureLayout::FlattenedEpoch => spec.n_freqs() * spec.n_times(),
    }
}

/// Rows contributed by one epoch.
fn rows_of(spec: &ChannelAveragedSpectrogram, layout: FeatureLayout) -> Vec<Vec<f64>> {
    match layout {
        FeatureLayout::PerTimeBin => spec.power.columns().into_iter().map(|c| c.to_vec()).collect(),
        FeatureLayout::FlattenedEpoch => vec![spec.flatten()],
    }
}

/// Build train/test feature sets from two classes of epochs.
///
/// Each class is shuffled independently with a seeded RNG and
/// `max(1, floor(train_fraction · n))` of its epochs go to training.
pub fn assemble(
    class_a: &[ChannelAveragedSpectrogram],
    class_b: &[ChannelAveragedSpectrogram],
    cfg: &AssembleConfig,
) -> Result<TrainTestSplit, AssemblyError> {
    let sides = stratified_split([class_a.len(), class_b.len()], cfg)?;
    check_unique_groups(class_a.iter().chain(class_b).map(|s| s.group))?;

    let n_features = width(&class_a[0], cfg.layout);
    for spec in class_a.iter().chain(class_b) {
        let got = width(spec, cfg.layout);
        if got != n_features {
            return Err(AssemblyError::ShapeMismatch { expected: n_features, got });
        }
    }

    let (label_a, label_b) = cfg.labels;
    let mut train = Builder::new(n_features);
    let mut test = Builder::new(n_features);
    let classes = [(class_a, label_a), (class_b, label_b)];
    for ((class, label), (train_idx, test_idx)) in classes.into_iter().zip(&sides) {
        for &i in train_idx {
            train.push_epoch(&class[i], label, cfg.layout)?;
        }
        for &i in test_idx {
            test.push_epoch(&class[i], label, cfg.layout)?;
        }
    }

    let split = TrainTestSplit { train: train.finish()?, test: test.finish()? };
    info!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        train_trials = split.train.unique_groups().len(),
        test_trials = split.test.unique_groups().len(),
        n_features,
        "features assembled"
    );
    Ok(split)
}

/// Raw `[E, C, n]` epochs with one label and one group id per epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledEpochs {
    pub data: Array3<f64>,
    pub labels: Vec<i32>,
    pub groups: Vec<usize>,
}

impl LabeledEpochs {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn select(&self, idx: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), idx),
            labels: idx.iter().map(|&i| self.labels[i]).collect(),
            groups: idx.iter().map(|&i| self.groups[i]).collect(),
        }
    }
}

/// Epoch-level counterpart of [`TrainTestSplit`].
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSplit {
    pub train: LabeledEpochs,
    pub test: LabeledEpochs,
}

/// Split two classes of raw epochs with the same trial shuffle as
/// [`assemble`]. `cfg.layout` does not apply; every epoch stays whole.
pub fn assemble_epochs(
    class_a: &ClassEpochs,
    class_b: &ClassEpochs,
    cfg: &AssembleConfig,
) -> Result<EpochSplit, AssemblyError> {
    let sides = stratified_split([class_a.len(), class_b.len()], cfg)?;
    check_unique_groups(class_a.groups.iter().chain(&class_b.groups).copied())?;
    let (shape_a, shape_b) = (&class_a.data.shape()[1..], &class_b.data.shape()[1..]);
    if shape_a != shape_b {
        return Err(AssemblyError::ShapeMismatch {
            expected: shape_a.iter().product(),
            got: shape_b.iter().product(),
        });
    }

    let (label_a, label_b) = cfg.labels;
    let take = |idx_a: &[usize], idx_b: &[usize]| -> Result<LabeledEpochs, AssemblyError> {
        let a = class_a.data.select(Axis(0), idx_a);
        let b = class_b.data.select(Axis(0), idx_b);
        let data = ndarray::concatenate(Axis(0), &[a.view(), b.view()]).map_err(|_| {
            AssemblyError::ShapeMismatch { expected: a.len(), got: b.len() }
        })?;
        let labels = std::iter::repeat(label_a)
            .take(idx_a.len())
            .chain(std::iter::repeat(label_b).take(idx_b.len()))
            .collect();
        let groups = idx_a
            .iter()
            .map(|&i| class_a.groups[i])
            .chain(idx_b.iter().map(|&i| class_b.groups[i]))
            .collect();
        Ok(LabeledEpochs { data, labels, groups })
    };
    let split = EpochSplit {
        train: take(&sides[0].0, &sides[1].0)?,
        test: take(&sides[0].1, &sides[1].1)?,
    };
    info!(train_trials = split.train.len(), test_trials = split.test.len(), "epochs assembled");
    Ok(split)
}

/// Per-class `(train, test)` positions.
///
/// One seeded RNG shuffles class a, then class b; the first
/// `max(1, floor(train_fraction · n))` shuffled positions of each class
/// train.
fn stratified_split(
    sizes: [usize; 2],
    cfg: &AssembleConfig,
) -> Result<[(Vec<usize>, Vec<usize>); 2], AssemblyError> {
    let frac = cfg.train_fraction;
    if !(frac > 0.0 && frac <= 1.0) {
        return Err(AssemblyError::InvalidTrainFraction(frac));
    }
    let (label_a, label_b) = cfg.labels;
    if sizes[0] == 0 {
        return Err(AssemblyError::EmptyClass(format!("label {label_a}")));
    }
    if sizes[1] == 0 {
        return Err(AssemblyError::EmptyClass(format!("label {label_b}")));
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    Ok(sizes.map(|n| {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let n_train = ((frac * n as f64 + 1e-9).floor() as usize).max(1);
        let test = order.split_off(n_train.min(n));
        (order, test)
    }))
}

fn check_unique_groups(groups: impl Iterator<Item = usize>) -> Result<(), AssemblyError> {
    let mut seen = HashSet::new();
    for g in groups {
        if !seen.insert(g) {
            return Err(AssemblyError::DuplicateGroup(g));
        }
    }
    Ok(())
}

struct Builder {
    n_features: usize,
    values: Vec<f64>,
    labels: Vec<i32>,
    groups: Vec<usize>,
}

impl Builder {
    fn new(n_features: usize) -> Self {
        Self { n_features, values: vec![], labels: vec![], groups: vec![] }
    }

    fn push_epoch(
        &mut self,
        spec: &ChannelAveragedSpectrogram,
        label: i32,
        layout: FeatureLayout,
    ) -> Result<(), AssemblyError> {
        for row in rows_of(spec, layout) {
            self.push_row(row, label, spec.group)?;
        }
        Ok(())
    }

    fn push_row(&mut self, row: Vec<f64>, label: i32, group: usize) -> Result<(), AssemblyError> {
        if row.len() != self.n_features {
            return Err(AssemblyError::ShapeMismatch { expected: self.n_features, got: row.len() });
        }
        self.values.extend(row);
        self.labels.push(label);
        self.groups.push(group);
        Ok(())
    }

    fn finish(self) -> Result<LabeledFeatureSet, AssemblyError> {
        let rows = self.labels.len();
        let got = self.values.len();
        let features = Array2::from_shape_vec((rows, self.n_features), self.values)
            .map_err(|_| AssemblyError::ShapeMismatch { expected: rows * self.n_features, got })?;
        Ok(LabeledFeatureSet { features, labels: self.labels, groups: self.groups })
    }
}
