//! Per-channel amplitude normalisation and bad-channel zeroing.
//!
//! `standardize_channels`: for each channel, `x = (x - mean(x)) / std(x)`,
//! population std (ddof = 0). Constant channels are left unchanged.
//!
//! `zero_channels`: overwrite known-bad channels with zeros so they cannot
//! contribute to channel averages downstream.
use ndarray::Array2;

/// Standardise each row of `data` (`[C, T]`) independently.
/// Returns the `(mean, std)` pair used for every channel.
pub fn standardize_channels(data: &Array2<f64>) -> (Array2<f64>, Vec<(f64, f64)>) {
    let mut out = data.clone();
    let mut stats = Vec::with_capacity(data.nrows());
    for mut row in out.rows_mut() {
        let n = row.len() as f64;
        if n == 0.0 {
            stats.push((0.0, 0.0));
            continue;
        }
        let mean = row.sum() / n;
        let var = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > 0.0 {
            row.mapv_inplace(|v| (v - mean) / std);
        }
        stats.push((mean, std));
    }
    (out, stats)
}

/// Zero-fill rows whose normalised name appears in `bad`.
///
/// Name normalisation: lowercase + strip spaces. Returns the names in `bad`
/// that matched no channel.
pub fn zero_channels(data: &mut Array2<f64>, ch_names: &[String], bad: &[String]) -> Vec<String> {
    let norm = |s: &str| s.replace(' ', "").to_lowercase();
    let mut missing = Vec::new();
    for bad_ch in bad {
        match ch_names.iter().position(|n| norm(n) == norm(bad_ch)) {
            Some(idx) => data.row_mut(idx).fill(0.0),
            None => missing.push(bad_ch.clone()),
        }
    }
    missing
}
