//! Grouped k-fold cross-validation.
//!
//! Groups are sorted by size, largest first, and each is placed in the fold
//! that currently holds the fewest rows (ties go to the lowest fold index).
//! A group never spans two folds.
use std::collections::BTreeMap;

use crate::error::AssemblyError;

/// `(train_rows, test_rows)` per fold, row indices ascending.
pub fn group_k_fold(
    groups: &[usize],
    n_splits: usize,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>, AssemblyError> {
    let mut sizes: BTreeMap<usize, usize> = BTreeMap::new();
    for &g in groups {
        *sizes.entry(g).or_default() += 1;
    }
    if n_splits < 2 || sizes.len() < n_splits {
        return Err(AssemblyError::TooFewGroups { n_groups: sizes.len(), n_splits });
    }

    let mut by_size: Vec<(usize, usize)> = sizes.into_iter().collect();
    // Stable sort keeps ascending group id among equal sizes.
    by_size.sort_by(|a, b| b.1.cmp(&a.1));

    let mut fold_rows = vec![0_usize; n_splits];
    let mut fold_of: BTreeMap<usize, usize> = BTreeMap::new();
    for (group, size) in by_size {
        let target = (0..n_splits).min_by_key(|&f| (fold_rows[f], f)).unwrap_or(0);
        fold_rows[target] += size;
        fold_of.insert(group, target);
    }

    Ok((0..n_splits)
        .map(|k| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..groups.len()).partition(|&i| fold_of[&groups[i]] == k);
            (train, test)
        })
        .collect())
}
