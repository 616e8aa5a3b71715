//! Continuous-recording preprocessing.
//!
//! ```text
//! validate → zero bad channels → band-pass → notch × k → [standardise] → drop leading
//! ```
//!
//! Every step produces a new array; the input [`Recording`] is never touched.
use tracing::{debug, info, warn};

use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::filter::{design_bandpass, design_bandstop, filter_data};
use crate::normalize::{standardize_channels, zero_channels};
use crate::recording::Recording;

/// Transition width of each notch band-stop, Hz.
const NOTCH_TRANS_BW: f64 = 1.0;

/// Run the preprocessing chain and return the cleaned recording.
///
/// Channel names and count are preserved. The sample count shrinks by exactly
/// `round(drop_leading_secs · sfreq)`.
pub fn preprocess(
    recording: &Recording,
    cfg: &PreprocessConfig,
) -> Result<Recording, PreprocessError> {
    validate(recording, cfg)?;
    let sfreq = recording.sfreq();

    let mut data = recording.data().clone();
    if !cfg.bad_channels.is_empty() {
        let missing = zero_channels(&mut data, recording.ch_names(), &cfg.bad_channels);
        for name in &missing {
            warn!(channel = %name, "bad channel not in recording; ignored");
        }
    }

    let (low, high) = cfg.band_pass;
    let h = design_bandpass(low, high, sfreq);
    if h.len() > recording.n_times() {
        warn!(
            taps = h.len(),
            n_times = recording.n_times(),
            "band-pass filter is longer than the signal"
        );
    }
    debug!(low, high, taps = h.len(), "band-pass");
    data = filter_data(&data, &h).map_err(PreprocessError::Filter)?;

    for &freq in &cfg.notch_freqs {
        let h = design_bandstop(freq, freq / 200.0, NOTCH_TRANS_BW, sfreq);
        debug!(freq, taps = h.len(), "notch");
        data = filter_data(&data, &h).map_err(PreprocessError::Filter)?;
    }

    if cfg.standardize {
        data = standardize_channels(&data).0;
    }

    let n_drop = (cfg.drop_leading_secs * sfreq).round() as usize;
    let out = recording.with_data(data).drop_leading(n_drop);
    info!(
        n_channels = out.n_channels(),
        dropped = n_drop,
        n_times = out.n_times(),
        annotations = out.annotations().len(),
        "preprocessed"
    );
    Ok(out)
}

fn validate(recording: &Recording, cfg: &PreprocessConfig) -> Result<(), PreprocessError> {
    let nyquist = recording.nyquist();
    let (low, high) = cfg.band_pass;
    if !(low > 0.0 && low < high && high < nyquist) {
        return Err(PreprocessError::InvalidBand { low, high, nyquist });
    }
    if let Some(&freq) = cfg.notch_freqs.iter().find(|&&f| !(f > 0.0 && f < nyquist)) {
        return Err(PreprocessError::InvalidNotch { freq, nyquist });
    }
    let duration = recording.duration_secs();
    let secs = cfg.drop_leading_secs;
    let n_drop = (secs * recording.sfreq()).round();
    if !(secs >= 0.0) || n_drop >= recording.n_times() as f64 {
        return Err(PreprocessError::InvalidCrop { secs, duration });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn two_tone(sfreq: f64, secs: f64) -> Recording {
        let n = (sfreq * secs) as usize;
        let data = Array2::from_shape_fn((2, n), |(c, t)| {
            let x = t as f64 / sfreq;
            (2.0 * PI * 10.0 * x).sin() + 3.0 + (2.0 * PI * 60.0 * x).sin() * c as f64
        });
        Recording::new(
            data,
            vec!["O1".into(), "O2".into()],
            sfreq,
            vec![Annotation::new(1.0, 0.5, "True-SSVEP-1"), Annotation::new(4.0, 1.0, "False-SSVEP-1")],
        )
        .unwrap()
    }

    #[test]
    fn inverted_band_rejected() {
        let rec = two_tone(250.0, 10.0);
        let cfg = PreprocessConfig { band_pass: (50.0, 5.0), ..Default::default() };
        assert!(matches!(preprocess(&rec, &cfg), Err(PreprocessError::InvalidBand { .. })));
    }

    #[test]
    fn band_above_nyquist_rejected() {
        let rec = two_tone(100.0, 10.0);
        let cfg = PreprocessConfig { band_pass: (5.0, 50.0), ..Default::default() };
        assert!(matches!(preprocess(&rec, &cfg), Err(PreprocessError::InvalidBand { .. })));
    }

    #[test]
    fn notch_at_nyquist_rejected() {
        let rec = two_tone(250.0, 10.0);
        let cfg = PreprocessConfig { notch_freqs: vec![125.0], ..Default::default() };
        assert!(matches!(preprocess(&rec, &cfg), Err(PreprocessError::InvalidNotch { .. })));
    }

    #[test]
    fn crop_longer_than_recording_rejected() {
        let rec = two_tone(250.0, 10.0);
        let cfg = PreprocessConfig { drop_leading_secs: 10.0, ..Default::default() };
        assert!(matches!(preprocess(&rec, &cfg), Err(PreprocessError::InvalidCrop { .. })));
        let cfg = PreprocessConfig { drop_leading_secs: -1.0, ..Default::default() };
        assert!(preprocess(&rec, &cfg).is_err());
    }

    #[test]
    fn drops_exact_sample_count_and_keeps_channels() {
        let rec = two_tone(250.0, 10.0);
        let out = preprocess(&rec, &PreprocessConfig::default()).unwrap();
        assert_eq!(out.n_times(), 2500 - 500);
        assert_eq!(out.ch_names(), rec.ch_names());
        // Annotation at 1.0 s started inside the dropped 2 s.
        assert_eq!(out.annotations().len(), 1);
        approx::assert_abs_diff_eq!(out.annotations()[0].onset, 2.0, epsilon = 1e-12);
        assert_eq!(rec.n_times(), 2500);
    }

    #[test]
    fn notch_suppresses_mains() {
        let rec = two_tone(250.0, 20.0);
        let cfg = PreprocessConfig {
            band_pass: (5.0, 80.0),
            notch_freqs: vec![60.0],
            drop_leading_secs: 0.0,
            ..Default::default()
        };
        let out = preprocess(&rec, &cfg).unwrap();
        // Channel 1 carries 10 Hz + 60 Hz; after notching, its interior
        // should match channel 0 (10 Hz only) closely.
        let mid = 2000..3000;
        let diff = mid
            .map(|t| (out.data()[[1, t]] - out.data()[[0, t]]).abs())
            .fold(0.0_f64, f64::max);
        assert!(diff < 0.05, "60 Hz residual {diff}");
        // Band-pass removed the DC offset.
        let dc = out.data().row(0).slice(ndarray::s![1000..4000]).mean().unwrap();
        assert!(dc.abs() < 1e-3);
    }

    #[test]
    fn bad_channel_zeroed_before_filtering() {
        let rec = two_tone(250.0, 10.0);
        let cfg = PreprocessConfig {
            bad_channels: vec!["o2".into(), "Fp1".into()],
            ..Default::default()
        };
        let out = preprocess(&rec, &cfg).unwrap();
        assert!(out.data().row(1).iter().all(|&v| v == 0.0));
        assert!(out.data().row(0).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn standardize_gives_unit_variance() {
        let rec = two_tone(250.0, 10.0);
        let cfg = PreprocessConfig { standardize: true, drop_leading_secs: 0.0, ..Default::default() };
        let out = preprocess(&rec, &cfg).unwrap();
        approx::assert_abs_diff_eq!(out.data().row(0).std(0.0), 1.0, epsilon = 1e-9);
    }
}
