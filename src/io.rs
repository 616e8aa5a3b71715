//! Recording persistence.
//!
//! [`load_recording`] dispatches on the file extension:
//!
//! | extension      | reader                                   |
//! |----------------|------------------------------------------|
//! | `.fif`         | [`crate::fiff::read_raw`]                |
//! | `.safetensors` | [`read_recording_safetensors`]           |
//!
//! The safetensors layout written by [`save_recording`]:
//!
//! | key               | dtype     | shape   | content                       |
//! |-------------------|-----------|---------|-------------------------------|
//! | `data`            | F64 / F32 | `[C,T]` | samples                       |
//! | `sfreq`           | F64 / F32 | `[1]`   | Hz                            |
//! | `ch_names`        | U8        | `[n]`   | JSON array of names           |
//! | `annot_onset`     | F64       | `[N]`   | seconds                       |
//! | `annot_duration`  | F64       | `[N]`   | seconds                       |
//! | `annot_description` | U8      | `[n]`   | JSON array of descriptions    |
//!
//! The annotation keys are optional as a group. Text tensors hold UTF-8
//! JSON so empty strings and embedded newlines survive a round trip.
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use serde::Deserialize;
use tracing::info;

use crate::annotation::Annotation;
use crate::error::LoadError;
use crate::recording::Recording;

/// Load a `.fif` or `.safetensors` recording.
pub fn load_recording(path: &Path) -> Result<Recording, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let malformed = |source| LoadError::Malformed { path: path.to_path_buf(), source };
    let parts = match ext.as_deref() {
        Some("fif") => crate::fiff::read_raw(path).map_err(malformed)?,
        Some("safetensors") => read_recording_safetensors(path).map_err(malformed)?,
        _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    };
    let rec = Recording::new(parts.data, parts.ch_names, parts.sfreq, parts.annotations)?;
    info!(
        path = %path.display(),
        n_channels = rec.n_channels(),
        n_times = rec.n_times(),
        sfreq = rec.sfreq(),
        annotations = rec.annotations().len(),
        "recording loaded"
    );
    Ok(rec)
}

/// Unvalidated recording contents as read from disk.
#[derive(Debug, Clone)]
pub struct RecordingParts {
    pub data: Array2<f64>,
    pub ch_names: Vec<String>,
    pub sfreq: f64,
    pub annotations: Vec<Annotation>,
}

/// Parse the safetensors recording layout.
pub fn read_recording_safetensors(path: &Path) -> Result<RecordingParts> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let st = SafeTensors::parse(&bytes)?;

    let (data_vec, shape) = st.f64_tensor("data")?;
    ensure!(shape.len() == 2, "'data' must be 2-D, got shape {shape:?}");
    let data = Array2::from_shape_vec((shape[0], shape[1]), data_vec)?;

    let (sfreq_vec, _) = st.f64_tensor("sfreq")?;
    let sfreq = *sfreq_vec.first().context("'sfreq' is empty")?;
    ensure!(sfreq.is_finite() && sfreq > 0.0, "invalid sfreq {sfreq}");

    let ch_names = st.string_list("ch_names")?;
    ensure!(
        ch_names.len() == data.nrows(),
        "{} channel names for {} data rows",
        ch_names.len(),
        data.nrows()
    );

    let annotations = if st.contains("annot_onset") {
        let (onset, _) = st.f64_tensor("annot_onset")?;
        let (duration, _) = st.f64_tensor("annot_duration")?;
        let description = st.string_list("annot_description")?;
        ensure!(
            onset.len() == duration.len() && onset.len() == description.len(),
            "annotation arrays differ in length: {} onsets, {} durations, {} descriptions",
            onset.len(),
            duration.len(),
            description.len()
        );
        onset
            .into_iter()
            .zip(duration)
            .zip(description)
            .map(|((o, d), s)| Annotation::new(o, d, s))
            .collect()
    } else {
        vec![]
    };

    Ok(RecordingParts { data, ch_names, sfreq, annotations })
}

/// Write `recording` in the layout [`read_recording_safetensors`] reads.
pub fn save_recording(recording: &Recording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", recording.data());
    w.add_f64("sfreq", &[recording.sfreq()], &[1]);
    w.add_text("ch_names", recording.ch_names());
    let ann = recording.annotations();
    let onsets: Vec<f64> = ann.iter().map(|a| a.onset).collect();
    let durations: Vec<f64> = ann.iter().map(|a| a.duration).collect();
    let descriptions: Vec<String> = ann.iter().map(|a| a.description.clone()).collect();
    w.add_f64("annot_onset", &onsets, &[onsets.len()]);
    w.add_f64("annot_duration", &durations, &[durations.len()]);
    w.add_text("annot_description", &descriptions);
    w.write(path)
}

// ── Safetensors reader ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Borrowed view over a safetensors buffer.
pub struct SafeTensors<'a> {
    tensors: HashMap<String, TensorInfo>,
    payload: &'a [u8],
}

impl<'a> SafeTensors<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        ensure!(bytes.len() >= 8, "safetensors file too small ({} bytes)", bytes.len());
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len) as usize;
        let end = n.checked_add(8).context("header length overflows")?;
        let header = bytes.get(8..end).context("header length exceeds file size")?;

        // `__metadata__` maps to strings, not tensor info.
        let raw: HashMap<String, serde_json::Value> =
            serde_json::from_slice(header).context("failed to parse safetensors header")?;
        let mut tensors = HashMap::new();
        for (name, value) in raw {
            if name == "__metadata__" {
                continue;
            }
            let info: TensorInfo = serde_json::from_value(value)
                .with_context(|| format!("bad header entry '{name}'"))?;
            tensors.insert(name, info);
        }

        let payload = &bytes[end..];
        for (name, t) in &tensors {
            let [s, e] = t.data_offsets;
            ensure!(s <= e && e <= payload.len(), "tensor '{name}' offsets {s}..{e} out of range");
        }
        Ok(Self { tensors, payload })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    fn entry(&self, name: &str) -> Result<(&TensorInfo, &'a [u8])> {
        let t = self.tensors.get(name).with_context(|| format!("missing '{name}' tensor"))?;
        let [s, e] = t.data_offsets;
        Ok((t, &self.payload[s..e]))
    }

    /// F64 or F32 tensor widened to `f64`, with its shape.
    pub fn f64_tensor(&self, name: &str) -> Result<(Vec<f64>, Vec<usize>)> {
        let (t, raw) = self.entry(name)?;
        let width = match t.dtype.as_str() {
            "F64" => 8,
            "F32" => 4,
            other => bail!("tensor '{name}' has dtype {other}, expected F32 or F64"),
        };
        let numel: usize = t.shape.iter().product();
        ensure!(
            raw.len() == numel * width,
            "tensor '{name}' holds {} bytes, shape {:?} needs {}",
            raw.len(),
            t.shape,
            numel * width
        );
        let values = if width == 8 {
            raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect()
        } else {
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect()
        };
        Ok((values, t.shape.clone()))
    }

    /// U8 tensor holding a JSON array of strings.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let (t, raw) = self.entry(name)?;
        ensure!(t.dtype == "U8", "tensor '{name}' has dtype {}, expected U8", t.dtype);
        serde_json::from_slice(raw).with_context(|| format!("'{name}' is not a JSON string array"))
    }
}

// ── Safetensors writer ───────────────────────────────────────────────────

/// Minimal safetensors writer for F32, F64, I32 and U8 text tensors.
///
/// ```rust,no_run
/// use lbci::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("freqs", &[0.0, 1.0, 2.0], &[3]);
/// w.add_text("labels", &["True-SSVEP-1".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Strings as a U8 tensor holding their JSON array.
    pub fn add_text<S: AsRef<str>>(&mut self, name: &str, lines: &[S]) {
        let list = lines.iter().map(|s| serde_json::Value::from(s.as_ref())).collect();
        let bytes = serde_json::Value::Array(list).to_string().into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let mut header = serde_json::to_vec(&header_map)?;
        let pad = (8 - header.len() % 8) % 8;
        header.extend(std::iter::repeat(b' ').take(pad));

        let mut f = std::io::BufWriter::new(
            std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        f.write_all(&(header.len() as u64).to_le_bytes())?;
        f.write_all(&header)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_tensor_widens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.safetensors");
        let mut w = StWriter::new();
        w.add_f32("x", &[1.5, -2.0], &[2]);
        w.add_i32("n", &[3], &[1]);
        w.write(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let st = SafeTensors::parse(&bytes).unwrap();
        assert_eq!(st.f64_tensor("x").unwrap().0, vec![1.5, -2.0]);
        assert!(st.f64_tensor("n").is_err());
        assert!(st.string_list("x").is_err());
    }

    #[test]
    fn truncated_header_rejected() {
        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(SafeTensors::parse(&bytes).is_err());
    }

    #[test]
    fn wrong_byte_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.safetensors");
        let mut w = StWriter::new();
        w.add_f64("x", &[1.0, 2.0, 3.0], &[2, 2]);
        w.write(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let st = SafeTensors::parse(&bytes).unwrap();
        assert!(st.f64_tensor("x").is_err());
    }
}
