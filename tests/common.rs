/// Shared builders for synthetic recordings.
use std::f64::consts::PI;

use lbci::acquisition::StreamConfig;
use lbci::{
    record_session, Annotation, Montage, Recording, Response, SyntheticBoard, TrialEvent, TrialType,
};
use ndarray::Array2;

#[allow(unused)]
pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Per-channel sum of sines (10 Hz + channel-specific 3..6 Hz) with the
/// given annotations.
#[allow(unused)]
pub fn sine_recording<S: AsRef<str>>(
    ch_names: &[&str],
    secs: f64,
    sfreq: f64,
    annotations: &[(f64, f64, S)],
) -> Recording {
    let n_t = (secs * sfreq).round() as usize;
    let data = Array2::from_shape_fn((ch_names.len(), n_t), |(c, t)| {
        let t = t as f64 / sfreq;
        (2.0 * PI * 10.0 * t).sin() + 0.5 * (2.0 * PI * (3.0 + c as f64) * t).cos()
    });
    let ann = annotations.iter().map(|(o, d, desc)| Annotation::new(*o, *d, desc.as_ref())).collect();
    Recording::new(data, names(ch_names), sfreq, ann).unwrap()
}

/// `n_per_class` alternating yes/no trials of `trial_type`, one every
/// `spacing` seconds starting at `first`, each `len` seconds long.
#[allow(unused)]
pub fn alternating_trials(
    trial_type: TrialType,
    n_per_class: usize,
    first: f64,
    spacing: f64,
    len: f64,
) -> Vec<(f64, f64, String)> {
    (0..2 * n_per_class)
        .map(|i| {
            let resp = if i % 2 == 0 { "True" } else { "False" };
            (first + spacing * i as f64, len, format!("{resp}-{trial_type}-{}", i / 2 + 1))
        })
        .collect()
}

/// SSVEP session on a 250 Hz synthetic board: yes trials carry a strong
/// 12 Hz tone on O1/O2, no trials are background only.
#[allow(unused)]
pub fn synthetic_ssvep_session(n_per_class: usize, seed: u64) -> Recording {
    let mut board = SyntheticBoard::new(250.0, seed).with_noise(2.0);
    let cfg = StreamConfig { montage: Montage::Standard, ..Default::default() };
    record_session(&mut board, &cfg, |b| {
        let mut events = Vec::new();
        b.advance(3.0).unwrap();
        for i in 0..2 * n_per_class {
            let response = if i % 2 == 0 { Response::Yes } else { Response::No };
            events.push(TrialEvent {
                time: b.now(),
                duration: 5.0,
                response,
                trial_type: TrialType::Ssvep,
                flag: (i / 2 + 1).to_string(),
            });
            match response {
                Response::Yes => b.advance_with_tone(5.0, 12.0, 20.0).unwrap(),
                Response::No => b.advance(5.0).unwrap(),
            }
            b.advance(2.0).unwrap();
        }
        events
    })
    .unwrap()
}

#[allow(unused)]
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[allow(unused)]
pub fn std_dev(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
