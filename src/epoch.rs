//! Annotation-anchored epoching.
//!
//! An epoch for annotation `i` spans samples
//! `[round((onset + tmin) · sfreq), start + round((tmax - tmin) · sfreq))`,
//! so every epoch of a given window has the same length regardless of where
//! its onset falls between samples. Windows reaching outside the recording
//! are an error rather than being padded or clipped.
use ndarray::{s, Array2, Array3};

use crate::error::EpochRangeError;
use crate::recording::Recording;

/// Samples per epoch for a `(tmin, tmax)` window.
pub fn epoch_len(window: (f64, f64), sfreq: f64) -> Result<usize, EpochRangeError> {
    let (tmin, tmax) = window;
    if !(tmin.is_finite() && tmax.is_finite()) {
        return Err(EpochRangeError::NonFiniteWindow { tmin, tmax });
    }
    if !(tmax > tmin) {
        return Err(EpochRangeError::EmptyWindow { tmin, tmax });
    }
    let n = ((tmax - tmin) * sfreq).round() as usize;
    if n == 0 {
        return Err(EpochRangeError::EmptyWindow { tmin, tmax });
    }
    Ok(n)
}

/// `(start, stop)` sample range of the epoch around annotation `index`.
pub fn epoch_bounds(
    recording: &Recording,
    index: usize,
    window: (f64, f64),
) -> Result<(usize, usize), EpochRangeError> {
    let n = epoch_len(window, recording.sfreq())?;
    let annotations = recording.annotations();
    let ann = annotations.get(index).ok_or(EpochRangeError::NoSuchAnnotation {
        index,
        n_annotations: annotations.len(),
    })?;
    let start = recording.time_to_index(ann.onset + window.0);
    let stop = isize::try_from(n).ok().and_then(|n| start.checked_add(n));
    match stop {
        Some(stop) if start >= 0 && stop <= recording.n_times() as isize => {
            Ok((start as usize, stop as usize))
        }
        _ => Err(EpochRangeError::OutOfBounds {
            index,
            description: ann.description.clone(),
            start: ann.onset + window.0,
            end: ann.onset + window.1,
            duration: recording.duration_secs(),
        }),
    }
}

/// `[C, n]` copy of every channel around annotation `index`.
pub fn epoch_window(
    recording: &Recording,
    index: usize,
    window: (f64, f64),
) -> Result<Array2<f64>, EpochRangeError> {
    let (start, stop) = epoch_bounds(recording, index, window)?;
    Ok(recording.data().slice(s![.., start..stop]).to_owned())
}

/// Stack the epochs of several annotations into `[E, C, n]`.
///
/// Fails on the first out-of-range window; nothing is returned partially.
pub fn epochs(
    recording: &Recording,
    indices: &[usize],
    window: (f64, f64),
) -> Result<Array3<f64>, EpochRangeError> {
    let n = epoch_len(window, recording.sfreq())?;
    let bounds = indices
        .iter()
        .map(|&idx| epoch_bounds(recording, idx, window))
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Array3::<f64>::zeros((indices.len(), recording.n_channels(), n));
    for (e, &(start, stop)) in bounds.iter().enumerate() {
        out.slice_mut(s![e, .., ..])
            .assign(&recording.data().slice(s![.., start..stop]));
    }
    Ok(out)
}
