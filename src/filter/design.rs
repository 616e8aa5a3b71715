//! Windowed-sinc FIR design following MNE's `create_filter(..., fir_design='firwin')`.
//!
//! Band-pass (`l_freq`, `h_freq`):
//!   • l_trans = min(max(0.25 * l_freq, 2.0), l_freq)
//!   • h_trans = min(max(0.25 * h_freq, 2.0), nyquist - h_freq)
//!   • N       = ceil(3.3 / min(l_trans, h_trans) * sfreq), rounded up to odd
//!   • cutoffs at the transition-band midpoints, Hamming window
//!
//! Band-stop (notch) uses the same machinery with an explicit transition width.
use std::f64::consts::PI;

/// MNE "auto" lower transition bandwidth.
pub fn auto_l_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE "auto" upper transition bandwidth.
pub fn auto_h_trans_bandwidth(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of taps for the narrowest transition band: `ceil(3.3 / trans_bw · sfreq)`,
/// rounded up to odd so the filter has an integer group delay.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

/// Zero-phase band-pass between `l_freq` and `h_freq` Hz.
///
/// Caller guarantees `0 < l_freq < h_freq < sfreq / 2`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Vec<f64> {
    let l_trans = auto_l_trans_bandwidth(l_freq);
    let h_trans = auto_h_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);

    let lo_cut = l_freq - l_trans / 2.0;
    let hi_cut = h_freq + h_trans / 2.0;

    // Band-pass = lowpass(hi) − lowpass(lo); both have unit DC gain.
    let lp_hi = firwin(n, hi_cut, sfreq);
    let lp_lo = firwin(n, lo_cut, sfreq);
    lp_hi.iter().zip(&lp_lo).map(|(h, l)| h - l).collect()
}

/// Zero-phase band-stop centred on `freq` Hz.
///
/// `width` is the stop-band width and `trans_bw` the transition on either side,
/// matching `mne.filter.notch_filter(method='fir')` with
/// `notch_widths = freq / 200` and `trans_bandwidth = 1`.
pub fn design_bandstop(freq: f64, width: f64, trans_bw: f64, sfreq: f64) -> Vec<f64> {
    let n = auto_filter_length(trans_bw, sfreq);
    let lo_cut = (freq - width / 2.0 - trans_bw / 2.0).max(0.0);
    let hi_cut = (freq + width / 2.0 + trans_bw / 2.0).min(sfreq / 2.0);

    // Band-stop = δ − (lowpass(hi) − lowpass(lo)).
    let lp_hi = firwin(n, hi_cut, sfreq);
    let lp_lo = if lo_cut > 0.0 { firwin(n, lo_cut, sfreq) } else { vec![0.0; n] };
    let mut h: Vec<f64> = lp_hi.iter().zip(&lp_lo).map(|(h, l)| -(h - l)).collect();
    h[n / 2] += 1.0;
    h
}

/// Hamming-windowed sinc lowpass with unit DC gain.
///
/// `cutoff_hz` is the −6 dB point. `n` must be odd.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Symmetric Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the filter's frequency response at `freq` Hz.
pub fn gain_at(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &c)| {
        (re + c * (w * k as f64).cos(), im - c * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_bandwidths_match_mne() {
        // filter(5, 50) at 125 Hz: l_trans = 2, h_trans = min(12.5, 12.5)
        approx::assert_abs_diff_eq!(auto_l_trans_bandwidth(5.0), 2.0);
        approx::assert_abs_diff_eq!(auto_h_trans_bandwidth(50.0, 125.0), 12.5);
        // Low edges cap the transition at the edge itself.
        approx::assert_abs_diff_eq!(auto_l_trans_bandwidth(1.0), 1.0);
    }

    #[test]
    fn bandpass_length_is_odd_and_mne_sized() {
        // 3.3 / 2.0 * 125 = 206.25 → 207
        let h = design_bandpass(5.0, 50.0, 125.0);
        assert_eq!(h.len(), 207);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_bandpass(7.0, 30.0, 250.0);
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_response_shape() {
        let sfreq = 250.0;
        let h = design_bandpass(5.0, 50.0, sfreq);
        assert!(gain_at(&h, 0.0, sfreq) < 1e-3, "DC leaks");
        approx::assert_abs_diff_eq!(gain_at(&h, 20.0, sfreq), 1.0, epsilon = 0.01);
        assert!(gain_at(&h, 100.0, sfreq) < 0.01, "high stop band leaks");
    }

    #[test]
    fn bandstop_notches_target_only() {
        let sfreq = 500.0;
        let h = design_bandstop(60.0, 60.0 / 200.0, 1.0, sfreq);
        assert!(h.len() % 2 == 1);
        assert!(gain_at(&h, 60.0, sfreq) < 0.05, "notch too shallow");
        approx::assert_abs_diff_eq!(gain_at(&h, 20.0, sfreq), 1.0, epsilon = 0.01);
        approx::assert_abs_diff_eq!(gain_at(&h, 0.0, sfreq), 1.0, epsilon = 0.01);
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }
}
