//! Per-class spectrogram extraction.
//!
//! For every annotation matching a class pattern: cut the epoch, compute one
//! power spectrogram per selected channel, and average them element-wise.
//! [`extract_class_epochs`] stops after the cut and keeps the raw samples.
use ndarray::Array3;
use tracing::{debug, info};

use crate::annotation::{select, AnnotationPattern, Response, TrialClass, TrialType};
use crate::config::SpectrogramParams;
use crate::epoch::{epoch_bounds, epoch_len, epochs};
use crate::error::{AssemblyError, PipelineError, SpectrogramError};
use crate::recording::Recording;
use crate::spectrogram::{average, ChannelAveragedSpectrogram, Stft};

/// Channel-averaged spectrograms for all annotations matching `pattern`.
///
/// Returns an empty list when nothing matches. Any out-of-range epoch,
/// unknown channel or invalid STFT parameter fails the whole call.
pub fn extract_class_spectrograms<S: AsRef<str>>(
    recording: &Recording,
    pattern: &AnnotationPattern,
    window: (f64, f64),
    channels: &[S],
    params: &SpectrogramParams,
) -> Result<Vec<ChannelAveragedSpectrogram>, PipelineError> {
    let matches = select(recording.annotations(), pattern);
    debug!(pattern = %pattern, n = matches.len(), "annotations matched");
    if matches.is_empty() {
        return Ok(vec![]);
    }

    let picked = recording.pick_channels(channels)?;
    let n = epoch_len(window, picked.sfreq())?;
    if params.window_len > n {
        return Err(SpectrogramError::WindowTooLong { window_len: params.window_len, n_samples: n }
            .into());
    }
    let stft = Stft::new(params, picked.sfreq())?;

    let mut out = Vec::with_capacity(matches.len());
    for idx in matches {
        let (start, stop) = epoch_bounds(&picked, idx, window)?;
        let per_channel = picked
            .data()
            .rows()
            .into_iter()
            .map(|row| {
                let x = row.slice(ndarray::s![start..stop]).to_vec();
                stft.compute(&x, window.0)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mean = average(&per_channel)?;
        let description = picked.annotations()[idx].description.clone();
        out.push(ChannelAveragedSpectrogram::from_spectrogram(mean, idx, description));
    }
    Ok(out)
}

/// Raw epochs of one class, in annotation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEpochs {
    /// `[E, C, n]`, channels in the requested order.
    pub data: Array3<f64>,
    /// Annotation index of each epoch.
    pub groups: Vec<usize>,
}

impl ClassEpochs {
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// `[E, C, n]` epochs of `channels` for all annotations matching `pattern`.
///
/// Returns an empty set when nothing matches.
pub fn extract_class_epochs<S: AsRef<str>>(
    recording: &Recording,
    pattern: &AnnotationPattern,
    window: (f64, f64),
    channels: &[S],
) -> Result<ClassEpochs, PipelineError> {
    let groups = select(recording.annotations(), pattern);
    debug!(pattern = %pattern, n = groups.len(), "annotations matched");
    if groups.is_empty() {
        return Ok(ClassEpochs { data: Array3::zeros((0, channels.len(), 0)), groups });
    }
    let picked = recording.pick_channels(channels)?;
    let data = epochs(&picked, &groups, window)?;
    Ok(ClassEpochs { data, groups })
}

/// Result of extracting one side of a binary comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassData {
    Found(Vec<ChannelAveragedSpectrogram>),
    /// No annotation matched the class pattern.
    NotFound,
}

impl ClassData {
    fn from_vec(v: Vec<ChannelAveragedSpectrogram>) -> Self {
        if v.is_empty() {
            Self::NotFound
        } else {
            Self::Found(v)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Number of epochs; `0` for `NotFound`.
    pub fn len(&self) -> usize {
        match self {
            Self::Found(v) => v.len(),
            Self::NotFound => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The `True-<type>-*` and `False-<type>-*` classes of one trial type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPair {
    pub trial_type: TrialType,
    pub yes: ClassData,
    pub no: ClassData,
}

impl ClassPair {
    /// Both epoch lists, or [`AssemblyError::SingleClass`] naming the
    /// pattern that matched nothing.
    pub fn into_both(
        self,
    ) -> Result<(Vec<ChannelAveragedSpectrogram>, Vec<ChannelAveragedSpectrogram>), AssemblyError>
    {
        let trial_type = self.trial_type;
        let missing = move |r| TrialClass::new(r, trial_type).pattern().to_string();
        match (self.yes, self.no) {
            (ClassData::Found(y), ClassData::Found(n)) => Ok((y, n)),
            (ClassData::NotFound, _) => Err(AssemblyError::SingleClass { missing: missing(Response::Yes) }),
            (_, ClassData::NotFound) => Err(AssemblyError::SingleClass { missing: missing(Response::No) }),
        }
    }
}

/// Extract both response classes of `trial_type`.
pub fn extract_class_pair<S: AsRef<str>>(
    recording: &Recording,
    trial_type: TrialType,
    window: (f64, f64),
    channels: &[S],
    params: &SpectrogramParams,
) -> Result<ClassPair, PipelineError> {
    let side = |response| -> Result<ClassData, PipelineError> {
        let pattern = TrialClass::new(response, trial_type).pattern();
        let specs = extract_class_spectrograms(recording, &pattern, window, channels, params)?;
        Ok(ClassData::from_vec(specs))
    };
    let yes = side(Response::Yes)?;
    let no = side(Response::No)?;
    info!(%trial_type, yes = yes.len(), no = no.len(), "class epochs extracted");
    Ok(ClassPair { trial_type, yes, no })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::error::EpochRangeError;
    use ndarray::Array2;

    fn rec(onsets: &[(f64, &str)]) -> Recording {
        let sfreq = 100.0;
        let data = Array2::from_shape_fn((3, 2000), |(c, t)| {
            ((c + 1) as f64 * t as f64 * 0.37).sin()
        });
        let ann = onsets.iter().map(|&(o, d)| Annotation::new(o, 1.0, d)).collect();
        Recording::new(data, vec!["O1".into(), "O2".into(), "Cz".into()], sfreq, ann).unwrap()
    }

    fn params() -> SpectrogramParams {
        SpectrogramParams { window_len: 50, overlap: 25, ..Default::default() }
    }

    #[test]
    fn groups_are_annotation_indices() {
        let r = rec(&[(1.0, "True-SSVEP-1"), (4.0, "False-SSVEP-1"), (8.0, "True-SSVEP-2")]);
        let specs = extract_class_spectrograms(
            &r,
            &AnnotationPattern::new("True-SSVEP-*"),
            (0.0, 2.0),
            &["O1", "O2"],
            &params(),
        )
        .unwrap();
        assert_eq!(specs.iter().map(|s| s.group).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(specs[1].description, "True-SSVEP-2");
        // (200 - 25) / 25 = 7 time bins, 26 frequency bins.
        assert_eq!(specs[0].power.dim(), (26, 7));
    }

    #[test]
    fn average_of_identical_channels_equals_single() {
        let data = Array2::from_shape_fn((2, 1000), |(_, t)| (t as f64 * 0.5).sin());
        let r = Recording::new(
            data,
            vec!["A".into(), "B".into()],
            100.0,
            vec![Annotation::new(1.0, 1.0, "True-alpha-1")],
        )
        .unwrap();
        let pat = AnnotationPattern::new("True-alpha-*");
        let both = extract_class_spectrograms(&r, &pat, (0.0, 3.0), &["A", "B"], &params()).unwrap();
        let one = extract_class_spectrograms(&r, &pat, (0.0, 3.0), &["A"], &params()).unwrap();
        assert_eq!(both[0].power, one[0].power);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let r = rec(&[(1.0, "True-SSVEP-1")]);
        let specs = extract_class_spectrograms(
            &r,
            &AnnotationPattern::new("True-LMI-a-*"),
            (0.0, 2.0),
            &["Nope"],
            &params(),
        )
        .unwrap();
        assert!(specs.is_empty());
    }

    #[test]
    fn unknown_channel_fails() {
        let r = rec(&[(1.0, "True-SSVEP-1")]);
        let err = extract_class_spectrograms(
            &r,
            &AnnotationPattern::new("True-SSVEP-*"),
            (0.0, 2.0),
            &["Pz"],
            &params(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Epoch(EpochRangeError::UnknownChannel(_))));
    }

    #[test]
    fn window_longer_than_epoch_fails() {
        let r = rec(&[(1.0, "True-SSVEP-1")]);
        let p = SpectrogramParams { window_len: 300, overlap: 0, ..Default::default() };
        let err = extract_class_spectrograms(
            &r,
            &AnnotationPattern::new("True-*"),
            (0.0, 2.0),
            &["O1"],
            &p,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Spectrogram(SpectrogramError::WindowTooLong { .. })));
    }

    #[test]
    fn class_epochs_keep_raw_samples() {
        let r = rec(&[(1.0, "True-SSVEP-1"), (4.0, "False-SSVEP-1"), (8.0, "True-SSVEP-2")]);
        let ep = extract_class_epochs(&r, &AnnotationPattern::new("True-SSVEP-*"), (0.0, 2.0), &["Cz", "O1"])
            .unwrap();
        assert_eq!(ep.groups, vec![0, 2]);
        assert_eq!(ep.data.shape(), &[2, 2, 200]);
        assert_eq!(ep.data[[1, 0, 0]], r.data()[[2, 800]]);
        assert_eq!(ep.data[[0, 1, 10]], r.data()[[0, 110]]);

        let none = extract_class_epochs(&r, &AnnotationPattern::new("False-LMI-*"), (0.0, 2.0), &["Pz"])
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn pair_reports_missing_side() {
        let r = rec(&[(1.0, "True-TMI-a-1"), (5.0, "True-TMI-a-2"), (9.0, "True-TMI-a-3")]);
        let pair =
            extract_class_pair(&r, TrialType::TmiActive, (0.0, 2.0), &["O1"], &params()).unwrap();
        assert_eq!(pair.yes.len(), 3);
        assert_eq!(pair.no, ClassData::NotFound);
        match pair.into_both() {
            Err(AssemblyError::SingleClass { missing }) => assert_eq!(missing, "False-TMI-a-*"),
            other => panic!("expected SingleClass, got {other:?}"),
        }
    }
}
