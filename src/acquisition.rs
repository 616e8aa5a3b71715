//! Device acquisition interface and a synthetic board.
//!
//! Devices deliver BrainFlow-style board buffers: one row per board channel
//! (package counter, EEG channels, timestamp, ...) and one column per sample.
//! [`record_session`] turns a streamed buffer plus the trial events logged
//! while it ran into a [`Recording`].
use std::collections::VecDeque;
use std::f64::consts::PI;

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotation::{Annotation, Response, TrialType};
use crate::error::{DeviceError, LoadError};
use crate::recording::Recording;

/// Electrode placement of the 16 EEG inputs, in board input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Montage {
    /// Standard 10-20 subset with occipital and parietal coverage.
    #[default]
    Standard,
    /// Fronto-central layout for laryngeal motor imagery.
    Laryngeal,
}

impl Montage {
    pub fn channel_names(&self) -> [&'static str; 16] {
        match self {
            Self::Standard => [
                "Fp1", "Fp2", "C3", "C4", "T5", "T6", "O1", "O2", "F7", "F8", "F3", "F4", "T3",
                "T4", "P3", "P4",
            ],
            Self::Laryngeal => [
                "FC1", "FC2", "C3", "C4", "FC5", "FC6", "O1", "O2", "F7", "F8", "F3", "F4", "T3",
                "T4", "PO3", "PO4",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Ring-buffer capacity in samples; the oldest samples are overwritten.
    ///
    /// Default: `450_000` (7.5 min at 1 kHz).
    pub buffer_samples: usize,
    pub montage: Montage,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { buffer_samples: 450_000, montage: Montage::Standard }
    }
}

/// Token for an active stream.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionHandle {
    id: u64,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A trial logged by the experiment runner, stamped on the device clock.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialEvent {
    /// Device-clock seconds.
    pub time: f64,
    pub duration: f64,
    pub response: Response,
    pub trial_type: TrialType,
    /// Free suffix, typically the trial number.
    pub flag: String,
}

impl TrialEvent {
    /// `"<True|False>-<type>-<flag>"`.
    pub fn description(&self) -> String {
        format!("{}-{}-{}", self.response.as_str(), self.trial_type, self.flag)
    }
}

/// A streaming EEG board.
pub trait AcquisitionDevice {
    fn sampling_rate(&self) -> f64;

    /// Board row holding the per-sample timestamp (device-clock seconds).
    fn timestamp_row(&self) -> usize;

    /// `(board row, channel name)` for every EEG input.
    fn channel_map(&self, montage: Montage) -> Vec<(usize, String)>;

    fn start_stream(&mut self, cfg: &StreamConfig) -> Result<SessionHandle, DeviceError>;

    /// All buffered samples as `[board rows, n]`; the buffer is emptied.
    fn flush(&mut self, session: &SessionHandle) -> Result<Array2<f64>, DeviceError>;

    fn stop(&mut self, session: SessionHandle) -> Result<(), DeviceError>;
}

/// Stream `device`, run `experiment` while it records, and build a recording
/// annotated with the returned trial events.
///
/// Event times are converted to onsets relative to the first buffered
/// sample's timestamp.
pub fn record_session<D, F>(
    device: &mut D,
    cfg: &StreamConfig,
    experiment: F,
) -> Result<Recording, LoadError>
where
    D: AcquisitionDevice,
    F: FnOnce(&mut D) -> Vec<TrialEvent>,
{
    let session = device.start_stream(cfg)?;
    let events = experiment(device);
    let raw = device.flush(&session)?;
    device.stop(session)?;

    let ts_row = device.timestamp_row();
    if raw.ncols() == 0 || ts_row >= raw.nrows() {
        return Err(LoadError::Inconsistent("device returned no samples".into()));
    }
    let t0 = raw[[ts_row, 0]];
    let annotations = events
        .iter()
        .map(|e| Annotation::new(e.time - t0, e.duration, e.description()))
        .collect();

    let rec = Recording::from_buffer(
        &raw,
        &device.channel_map(cfg.montage),
        device.sampling_rate(),
        annotations,
    )?;
    info!(
        n_channels = rec.n_channels(),
        secs = rec.duration_secs(),
        trials = rec.annotations().len(),
        "session recorded"
    );
    Ok(rec)
}

// ── Synthetic board ──────────────────────────────────────────────────────

const SYNTH_EEG_ROWS: usize = 16;
/// Package counter, 16 EEG rows, timestamp.
const SYNTH_ROWS: usize = SYNTH_EEG_ROWS + 2;
/// Device clock at the first generated sample.
const SYNTH_CLOCK_START: f64 = 1_000.0;

/// Deterministic board: a 10 Hz background rhythm plus uniform noise on every
/// channel, with optional tones injected on the occipital inputs.
///
/// Time is simulated; [`SyntheticBoard::advance`] produces samples as if
/// that many seconds had passed.
pub struct SyntheticBoard {
    sfreq: f64,
    noise_uv: f64,
    rng: StdRng,
    sample_index: u64,
    buffer: VecDeque<[f64; SYNTH_ROWS]>,
    capacity: usize,
    session: Option<u64>,
    next_session: u64,
}

impl SyntheticBoard {
    pub fn new(sfreq: f64, seed: u64) -> Self {
        Self {
            sfreq,
            noise_uv: 5.0,
            rng: StdRng::seed_from_u64(seed),
            sample_index: 0,
            buffer: VecDeque::new(),
            capacity: 0,
            session: None,
            next_session: 1,
        }
    }

    pub fn with_noise(mut self, noise_uv: f64) -> Self {
        self.noise_uv = noise_uv;
        self
    }

    /// Device-clock time of the next sample.
    pub fn now(&self) -> f64 {
        SYNTH_CLOCK_START + self.sample_index as f64 / self.sfreq
    }

    /// Generate `secs` of background activity.
    pub fn advance(&mut self, secs: f64) -> Result<(), DeviceError> {
        self.generate(secs, None)
    }

    /// Generate `secs` with an extra `freq_hz` sine of `amplitude_uv` on the
    /// occipital inputs, as a flickering stimulus would evoke.
    pub fn advance_with_tone(
        &mut self,
        secs: f64,
        freq_hz: f64,
        amplitude_uv: f64,
    ) -> Result<(), DeviceError> {
        self.generate(secs, Some((freq_hz, amplitude_uv)))
    }

    fn generate(&mut self, secs: f64, tone: Option<(f64, f64)>) -> Result<(), DeviceError> {
        if self.session.is_none() {
            return Err(DeviceError::NotStreaming);
        }
        let n = (secs * self.sfreq).round() as usize;
        for _ in 0..n {
            let t = self.sample_index as f64 / self.sfreq;
            let mut col = [0.0; SYNTH_ROWS];
            col[0] = (self.sample_index % 256) as f64;
            for ch in 0..SYNTH_EEG_ROWS {
                let background = 10.0 * (2.0 * PI * 10.0 * t + ch as f64).sin();
                let noise = self.rng.gen_range(-1.0..1.0) * self.noise_uv;
                col[1 + ch] = background + noise;
            }
            if let Some((freq, amp)) = tone {
                // Inputs 7 and 8 (O1, O2) in both montages.
                for ch in [6, 7] {
                    col[1 + ch] += amp * (2.0 * PI * freq * t).sin();
                }
            }
            col[SYNTH_ROWS - 1] = self.now();

            if self.buffer.len() == self.capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(col);
            self.sample_index += 1;
        }
        Ok(())
    }

    fn check(&self, session: &SessionHandle) -> Result<(), DeviceError> {
        match self.session {
            None => Err(DeviceError::NotStreaming),
            Some(id) if id != session.id => Err(DeviceError::StaleSession(session.id)),
            Some(_) => Ok(()),
        }
    }
}

impl AcquisitionDevice for SyntheticBoard {
    fn sampling_rate(&self) -> f64 {
        self.sfreq
    }

    fn timestamp_row(&self) -> usize {
        SYNTH_ROWS - 1
    }

    fn channel_map(&self, montage: Montage) -> Vec<(usize, String)> {
        montage
            .channel_names()
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.to_string()))
            .collect()
    }

    fn start_stream(&mut self, cfg: &StreamConfig) -> Result<SessionHandle, DeviceError> {
        if self.session.is_some() {
            return Err(DeviceError::AlreadyStreaming);
        }
        if cfg.buffer_samples == 0 {
            return Err(DeviceError::EmptyBuffer);
        }
        let id = self.next_session;
        self.next_session += 1;
        self.session = Some(id);
        self.capacity = cfg.buffer_samples;
        self.buffer.clear();
        debug!(id, capacity = self.capacity, "synthetic stream started");
        Ok(SessionHandle { id })
    }

    fn flush(&mut self, session: &SessionHandle) -> Result<Array2<f64>, DeviceError> {
        self.check(session)?;
        let n = self.buffer.len();
        let mut out = Array2::<f64>::zeros((SYNTH_ROWS, n));
        for (j, col) in self.buffer.drain(..).enumerate() {
            for (i, &v) in col.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    fn stop(&mut self, session: SessionHandle) -> Result<(), DeviceError> {
        self.check(&session)?;
        self.session = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_returns_board_layout() {
        let mut board = SyntheticBoard::new(250.0, 1);
        let s = board.start_stream(&StreamConfig::default()).unwrap();
        board.advance(2.0).unwrap();
        let raw = board.flush(&s).unwrap();
        assert_eq!(raw.dim(), (18, 500));
        approx::assert_abs_diff_eq!(raw[[17, 1]] - raw[[17, 0]], 1.0 / 250.0, epsilon = 1e-9);
        assert_eq!(board.flush(&s).unwrap().ncols(), 0);
        board.stop(s).unwrap();
    }

    #[test]
    fn ring_buffer_keeps_latest() {
        let mut board = SyntheticBoard::new(100.0, 1);
        let cfg = StreamConfig { buffer_samples: 50, ..Default::default() };
        let s = board.start_stream(&cfg).unwrap();
        board.advance(1.0).unwrap();
        let raw = board.flush(&s).unwrap();
        assert_eq!(raw.ncols(), 50);
        assert_eq!(raw[[0, 0]], 50.0);
    }

    #[test]
    fn session_misuse() {
        let mut board = SyntheticBoard::new(100.0, 1);
        assert!(matches!(board.advance(1.0), Err(DeviceError::NotStreaming)));
        let s = board.start_stream(&StreamConfig::default()).unwrap();
        assert!(matches!(
            board.start_stream(&StreamConfig::default()),
            Err(DeviceError::AlreadyStreaming)
        ));
        board.stop(s).unwrap();
        let stale = SessionHandle { id: 1 };
        assert!(board.flush(&stale).is_err());
    }

    #[test]
    fn same_seed_same_signal() {
        let run = |seed| {
            let mut board = SyntheticBoard::new(100.0, seed);
            let s = board.start_stream(&StreamConfig::default()).unwrap();
            board.advance(0.5).unwrap();
            board.flush(&s).unwrap()
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3), run(4));
    }

    #[test]
    fn record_session_annotates_relative_to_first_sample() {
        let mut board = SyntheticBoard::new(250.0, 7);
        let rec = record_session(&mut board, &StreamConfig::default(), |b| {
            b.advance(1.0).unwrap();
            let t = b.now();
            b.advance_with_tone(2.0, 12.0, 20.0).unwrap();
            b.advance(1.0).unwrap();
            vec![TrialEvent {
                time: t,
                duration: 2.0,
                response: Response::Yes,
                trial_type: TrialType::Ssvep,
                flag: "1".into(),
            }]
        })
        .unwrap();
        assert_eq!(rec.n_channels(), 16);
        assert_eq!(rec.n_times(), 1000);
        assert_eq!(rec.ch_names()[6], "O1");
        assert_eq!(rec.annotations()[0].description, "True-SSVEP-1");
        approx::assert_abs_diff_eq!(rec.annotations()[0].onset, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn device_failures_surface_as_load_errors() {
        let mut board = SyntheticBoard::new(100.0, 1);
        let _held = board.start_stream(&StreamConfig::default()).unwrap();
        let err = record_session(&mut board, &StreamConfig::default(), |_| Vec::new()).unwrap_err();
        assert!(matches!(err, LoadError::Device(DeviceError::AlreadyStreaming)));

        let mut idle = SyntheticBoard::new(100.0, 1);
        let err = record_session(&mut idle, &StreamConfig::default(), |_| Vec::new()).unwrap_err();
        assert!(matches!(err, LoadError::Inconsistent(_)));
    }
}
