/// lbci-spectrograms: run the pipeline stages up to feature extraction and
/// write every intermediate array to a safetensors file for comparison
/// against SciPy/MNE.
///
/// Output keys:
///   raw            [C, T]          F64  recording as loaded
///   preprocessed   [C, T']         F64  after band-pass, notches, crop
///   ch_names       U8                   channel names (JSON array)
///   sfreq          [1]             F64
///   freqs          [F]             F64  spectrogram frequencies (Hz)
///   times          [K]             F64  segment centres (s, from epoch start)
///   yes_N          [F, K]          F64  channel-averaged power, N-th "True" epoch
///   no_N           [F, K]          F64  same for "False" epochs
///   yes_groups     [n_yes]         I32  annotation index of each yes_N
///   no_groups      [n_no]          I32
///   yes_labels     U8                   descriptions of the yes epochs (JSON array)
///   no_labels      U8
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lbci::{
    extract_class_pair, io::load_recording, preprocess, ChannelAveragedSpectrogram, ClassData,
    PipelineConfig, StWriter, TrialType,
};

#[derive(Parser, Debug)]
#[command(name = "lbci-spectrograms")]
struct Args {
    /// Input recording (.fif or .safetensors).
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    #[arg(long, default_value = "SSVEP")]
    trial_type: TrialType,

    /// Pipeline configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the raw and preprocessed signals.
    #[arg(long)]
    features_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let cfg = match &args.config {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    };

    let t = Instant::now();
    let raw = load_recording(&args.input)?;
    let ms_load = t.elapsed().as_secs_f64() * 1000.0;

    let t = Instant::now();
    let clean = preprocess(&raw, &cfg.preprocess)?;
    let ms_pre = t.elapsed().as_secs_f64() * 1000.0;

    let t = Instant::now();
    let pair = extract_class_pair(&clean, args.trial_type, cfg.window, &cfg.channels, &cfg.spectrogram)?;
    let ms_spec = t.elapsed().as_secs_f64() * 1000.0;
    info!(load_ms = ms_load, preprocess_ms = ms_pre, spectrogram_ms = ms_spec, "stages timed");

    let mut w = StWriter::new();
    if !args.features_only {
        w.add_f64_arr2("raw", raw.data());
        w.add_f64_arr2("preprocessed", clean.data());
    }
    w.add_text("ch_names", clean.ch_names());
    w.add_f64("sfreq", &[clean.sfreq()], &[1]);

    let mut axes_written = false;
    for (prefix, side) in [("yes", &pair.yes), ("no", &pair.no)] {
        let specs: &[ChannelAveragedSpectrogram] = match side {
            ClassData::Found(v) => v,
            ClassData::NotFound => {
                info!(side = prefix, "no matching epochs");
                continue;
            }
        };
        if !axes_written {
            if let Some(first) = specs.first() {
                w.add_f64("freqs", &first.freqs.to_vec(), &[first.n_freqs()]);
                w.add_f64("times", &first.times.to_vec(), &[first.n_times()]);
                axes_written = true;
            }
        }
        for (i, s) in specs.iter().enumerate() {
            w.add_f64_arr2(&format!("{prefix}_{i}"), &s.power);
        }
        let groups: Vec<i32> = specs.iter().map(|s| s.group as i32).collect();
        w.add_i32(&format!("{prefix}_groups"), &groups, &[groups.len()]);
        let labels: Vec<&str> = specs.iter().map(|s| s.description.as_str()).collect();
        w.add_text(&format!("{prefix}_labels"), &labels);
    }
    w.write(&args.output)?;
    info!(path = %args.output.display(), yes = pair.yes.len(), no = pair.no.len(), "stages written");
    Ok(())
}
