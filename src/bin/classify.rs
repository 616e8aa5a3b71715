/// lbci-classify: run the yes/no classification pipeline for one trial type
/// and print the scores.
///
/// The recording comes from `--input` (`.fif` or `.safetensors`) or, with
/// `--synthetic N`, from a simulated SSVEP session of N trials per class.
/// Settings are read from `--config` (JSON, any subset of fields) and then
/// overridden by the flags below.
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use lbci::acquisition::StreamConfig;
use lbci::{
    io::load_recording, record_session, run, CrossValidation, CspModel, FeatureMethod, Montage,
    ModelKind, PipelineConfig, Recording, Response, SyntheticBoard, TrialEvent, TrialType,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Svm,
    Lda,
}

#[derive(Parser, Debug)]
#[command(name = "lbci-classify", about = "Yes/no classification of BCI trials from EEG spectrograms")]
struct Args {
    /// Recording to analyse (.fif or .safetensors).
    #[arg(long, required_unless_present = "synthetic")]
    input: Option<PathBuf>,

    /// Simulate an SSVEP session with this many trials per class instead of reading a file.
    #[arg(long, conflicts_with = "input")]
    synthetic: Option<usize>,

    /// Trial type: SSVEP, TMI-a, TMI-i, LMI-a, LMI-i or alpha.
    #[arg(long, default_value = "SSVEP")]
    trial_type: TrialType,

    /// Pipeline configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Estimator family.
    #[arg(long, value_enum)]
    model: Option<Model>,

    /// SVM regularisation constant.
    #[arg(long)]
    c: Option<f64>,

    /// LDA shrinkage in [0, 1].
    #[arg(long)]
    shrinkage: Option<f64>,

    /// Fraction of each class's trials used for training.
    #[arg(long)]
    train_fraction: Option<f64>,

    /// Shuffle seed for the train/test split.
    #[arg(long)]
    seed: Option<u64>,

    /// Classify the log power of this many common spatial patterns instead
    /// of spectrogram rows.
    #[arg(long)]
    csp: Option<usize>,

    /// Grouped k-fold cross-validation on the training trials.
    #[arg(long)]
    cv_folds: Option<usize>,

    /// Channels to average (comma-separated).
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<String>>,

    /// Channels to zero before filtering (comma-separated).
    #[arg(long, value_delimiter = ',')]
    bad_channels: Option<Vec<String>>,

    /// Write the fitted model as JSON.
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Print the full report as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = build_config(&args)?;

    let recording = match (&args.input, args.synthetic) {
        (Some(path), _) => load_recording(path)?,
        (None, Some(n)) => synthetic_session(n)?,
        (None, None) => bail!("either --input or --synthetic is required"),
    };

    let report = run(&recording, args.trial_type, &cfg)?;

    if let Some(path) = &args.save_model {
        match &report.csp {
            Some(csp) => CspModel { csp: csp.clone(), model: report.model.clone() }.save(path)?,
            None => report.model.save(path)?,
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let s = &report.scores;
    println!("trial type      {}", report.trial_type);
    println!("epochs          yes={} no={}", report.yes_epochs, report.no_epochs);
    println!(
        "rows            train={} test={} features={}",
        report.train_rows, report.test_rows, report.n_features
    );
    println!("train accuracy  {:.3}", s.train_accuracy);
    match s.test_accuracy {
        Some(acc) => println!("test accuracy   {acc:.3}"),
        None => println!("test accuracy   n/a (empty test set)"),
    }
    if let Some(mean) = s.cv_mean() {
        let folds: Vec<String> = s.cv_accuracies.iter().map(|a| format!("{a:.3}")).collect();
        println!("cv accuracy     {mean:.3}  [{}]", folds.join(", "));
    }
    println!("\n{}", s.confusion);
    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match args.model {
        Some(Model::Lda) if !matches!(cfg.model.kind, ModelKind::Lda { .. }) => {
            cfg.model.kind = ModelKind::Lda { shrinkage: 0.0 };
        }
        Some(Model::Svm) if !matches!(cfg.model.kind, ModelKind::LinearSvm { .. }) => {
            cfg.model.kind = ModelKind::default();
        }
        _ => {}
    }
    match &mut cfg.model.kind {
        ModelKind::LinearSvm { c, .. } => {
            if let Some(v) = args.c {
                *c = v;
            }
        }
        ModelKind::Lda { shrinkage } => {
            if let Some(v) = args.shrinkage {
                *shrinkage = v;
            }
        }
    }
    if let Some(f) = args.train_fraction {
        cfg.assemble.train_fraction = f;
    }
    if let Some(s) = args.seed {
        cfg.assemble.seed = s;
    }
    if let Some(n_components) = args.csp {
        cfg.method = FeatureMethod::Csp { n_components };
    }
    if let Some(n) = args.cv_folds {
        cfg.cv = Some(CrossValidation::GroupKFold { n_splits: n });
    }
    if let Some(ch) = &args.channels {
        cfg.channels = ch.clone();
    }
    if let Some(bad) = &args.bad_channels {
        cfg.preprocess.bad_channels = bad.clone();
    }
    Ok(cfg)
}

/// Alternating yes/no SSVEP trials on a 250 Hz synthetic board: "yes" trials
/// carry a 12 Hz tone on O1/O2, "no" trials do not.
fn synthetic_session(trials_per_class: usize) -> Result<Recording> {
    let mut board = SyntheticBoard::new(250.0, 7);
    let cfg = StreamConfig { montage: Montage::Standard, ..Default::default() };
    let mut failure = None;
    let rec = record_session(&mut board, &cfg, |b| {
        let mut events = Vec::new();
        let mut step = || -> Result<(), lbci::DeviceError> {
            b.advance(3.0)?;
            for i in 0..trials_per_class * 2 {
                let response = if i % 2 == 0 { Response::Yes } else { Response::No };
                events.push(TrialEvent {
                    time: b.now(),
                    duration: 5.0,
                    response,
                    trial_type: TrialType::Ssvep,
                    flag: (i / 2 + 1).to_string(),
                });
                match response {
                    Response::Yes => b.advance_with_tone(5.0, 12.0, 8.0)?,
                    Response::No => b.advance(5.0)?,
                }
                b.advance(2.0)?;
            }
            Ok(())
        };
        if let Err(e) = step() {
            failure = Some(e);
        }
        events
    })?;
    if let Some(e) = failure {
        bail!("synthetic session failed: {e}");
    }
    Ok(rec)
}
