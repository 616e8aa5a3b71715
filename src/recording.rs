//! In-memory continuous recording.
//!
//! A [`Recording`] owns a `[C, T]` sample matrix, its channel names, sampling
//! rate and the annotation list. Constructors validate the invariants once;
//! every later stage treats the value as read-only and returns new
//! recordings instead of mutating.
use std::collections::HashSet;

use ndarray::{s, Array2, Axis};

use crate::annotation::Annotation;
use crate::error::{EpochRangeError, LoadError};

/// Continuous, uniformly sampled multi-channel EEG.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    sfreq: f64,
    ch_names: Vec<String>,
    /// `[n_channels, n_times]`, physical units.
    data: Array2<f64>,
    /// Sorted by onset.
    annotations: Vec<Annotation>,
}

impl Recording {
    /// Build a recording, checking shape, channel names and annotation bounds.
    pub fn new(
        data: Array2<f64>,
        ch_names: Vec<String>,
        sfreq: f64,
        mut annotations: Vec<Annotation>,
    ) -> Result<Self, LoadError> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(LoadError::Inconsistent(format!("invalid sampling rate {sfreq}")));
        }
        if ch_names.len() != data.nrows() {
            return Err(LoadError::Inconsistent(format!(
                "{} channel names for {} data rows",
                ch_names.len(),
                data.nrows()
            )));
        }
        let mut seen = HashSet::new();
        for name in &ch_names {
            if !seen.insert(name.as_str()) {
                return Err(LoadError::Inconsistent(format!("duplicate channel name '{name}'")));
            }
        }

        let duration = data.ncols() as f64 / sfreq;
        // Half a sample of slack for onsets rounded by the writer.
        let slack = 0.5 / sfreq;
        for a in &annotations {
            if !(a.onset >= 0.0 && a.duration >= 0.0) || a.end() > duration + slack {
                return Err(LoadError::Inconsistent(format!(
                    "annotation '{}' ({:.3}..{:.3} s) outside recording of {duration:.3} s",
                    a.description,
                    a.onset,
                    a.end()
                )));
            }
        }
        annotations.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        Ok(Self { sfreq, ch_names, data, annotations })
    }

    /// Build a recording from a flushed device buffer.
    ///
    /// `raw` rows are device channels; `channel_map` lists `(row, name)` pairs
    /// and only those rows are kept, in map order.
    pub fn from_buffer(
        raw: &Array2<f64>,
        channel_map: &[(usize, String)],
        sfreq: f64,
        annotations: Vec<Annotation>,
    ) -> Result<Self, LoadError> {
        let mut data = Array2::<f64>::zeros((channel_map.len(), raw.ncols()));
        for (out_row, (row, _)) in channel_map.iter().enumerate() {
            if *row >= raw.nrows() {
                return Err(LoadError::Inconsistent(format!(
                    "channel index {row} out of range for a {}-row buffer",
                    raw.nrows()
                )));
            }
            data.row_mut(out_row).assign(&raw.row(*row));
        }
        let names = channel_map.iter().map(|(_, n)| n.clone()).collect();
        Self::new(data, names, sfreq, annotations)
    }

    /// Join recordings end to end. Later annotation onsets are shifted by the
    /// accumulated duration.
    pub fn concatenate(recordings: &[Recording]) -> Result<Self, LoadError> {
        let first = recordings
            .first()
            .ok_or_else(|| LoadError::Inconsistent("nothing to concatenate".into()))?;

        let mut views = Vec::with_capacity(recordings.len());
        let mut annotations = Vec::new();
        let mut offset = 0.0;
        for (i, rec) in recordings.iter().enumerate() {
            if (rec.sfreq - first.sfreq).abs() > 1e-9 {
                return Err(LoadError::Inconsistent(format!(
                    "recording {i} has sfreq {} Hz, expected {} Hz",
                    rec.sfreq, first.sfreq
                )));
            }
            if rec.ch_names != first.ch_names {
                return Err(LoadError::Inconsistent(format!(
                    "recording {i} channels {:?} differ from {:?}",
                    rec.ch_names, first.ch_names
                )));
            }
            views.push(rec.data.view());
            annotations.extend(rec.annotations.iter().map(|a| Annotation {
                onset: a.onset + offset,
                ..a.clone()
            }));
            offset += rec.duration_secs();
        }
        let data = ndarray::concatenate(Axis(1), &views)
            .map_err(|e| LoadError::Inconsistent(e.to_string()))?;
        Self::new(data, first.ch_names.clone(), first.sfreq, annotations)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    #[inline]
    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    #[inline]
    pub fn nyquist(&self) -> f64 {
        self.sfreq / 2.0
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    /// Row index of `name`, exact match.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Seconds → sample index, rounded to nearest.
    #[inline]
    pub fn time_to_index(&self, secs: f64) -> isize {
        (secs * self.sfreq).round() as isize
    }

    // ── Derivations ──────────────────────────────────────────────────────

    /// New recording restricted to `names`, in the given order.
    pub fn pick_channels<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, EpochRangeError> {
        if names.is_empty() {
            return Err(EpochRangeError::NoChannels);
        }
        let idx = names
            .iter()
            .map(|n| {
                self.channel_index(n.as_ref())
                    .ok_or_else(|| EpochRangeError::UnknownChannel(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = self.data.select(Axis(0), &idx);
        Ok(Self {
            sfreq: self.sfreq,
            ch_names: names.iter().map(|n| n.as_ref().to_string()).collect(),
            data,
            annotations: self.annotations.clone(),
        })
    }

    /// Same channels and annotations, different samples.
    ///
    /// Used by preprocessing, which never changes shape except via
    /// [`Recording::drop_leading`].
    pub(crate) fn with_data(&self, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.dim(), self.data.dim());
        Self {
            sfreq: self.sfreq,
            ch_names: self.ch_names.clone(),
            data,
            annotations: self.annotations.clone(),
        }
    }

    /// Drop the first `n` samples of every channel and move annotations onto
    /// the shortened timeline. Annotations starting before the cut are
    /// removed.
    pub(crate) fn drop_leading(&self, n: usize) -> Self {
        let n = n.min(self.n_times());
        let shift = n as f64 / self.sfreq;
        let data = self.data.slice(s![.., n..]).to_owned();
        let annotations = self
            .annotations
            .iter()
            .filter(|a| a.onset >= shift)
            .map(|a| Annotation { onset: a.onset - shift, ..a.clone() })
            .collect();
        Self { sfreq: self.sfreq, ch_names: self.ch_names.clone(), data, annotations }
    }
}
