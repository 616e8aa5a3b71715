//! Continuous-data reader.
//!
//! 1. Load the tag directory (embedded directory if present, else scan).
//! 2. Build the block tree and read the measurement info.
//! 3. Walk the raw-data block: `FIFF_FIRST_SAMPLE`, data buffers and skips.
//! 4. Decode each buffer (`[n_samp, n_chan]`, big-endian) into the
//!    `[n_chan, n_times]` output, multiplying by `cal × range` per channel.
//! 5. Read the annotation block, shifted by `first_samp / sfreq`.
//!
//! Skipped buffers become zeros of the same length.
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{s, Array2};
use tracing::debug;

use super::annotations::read_annotations;
use super::constants::*;
use super::info::read_meas_info;
use super::tag::{be_f32, be_i32, read_i32, TagHeader};
use super::tree::{read_tree, scan_directory, try_load_directory, Node};
use crate::io::RecordingParts;

#[derive(Debug, Clone, Copy)]
enum Chunk {
    Data(TagHeader),
    Gap,
}

#[derive(Debug, Clone, Copy)]
struct BufferRecord {
    chunk: Chunk,
    n_samp: usize,
}

/// Read a `.fif` raw file into memory.
pub fn read_raw(path: &Path) -> Result<RecordingParts> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_raw_from(&mut BufReader::new(file))
}

/// [`read_raw`] over any seekable byte source.
pub fn read_raw_from<R: Read + Seek>(reader: &mut R) -> Result<RecordingParts> {
    let directory = match try_load_directory(reader)? {
        Some(d) => d,
        None => scan_directory(reader)?,
    };
    let tree = read_tree(reader, &directory)?;
    let info = read_meas_info(reader, &tree)?;

    let raw_node = tree
        .find_block(FIFFB_MEAS)
        .and_then(|m| m.find_block(FIFFB_RAW_DATA).or_else(|| m.find_block(FIFFB_CONTINUOUS_DATA)))
        .ok_or_else(|| anyhow!("no raw-data block in FIF file"))?;
    let (first_samp, buffers) = buffer_table(reader, raw_node, info.n_chan())?;

    let n_times: usize = buffers.iter().map(|b| b.n_samp).sum();
    let cals = info.cals();
    let mut data = Array2::<f64>::zeros((info.n_chan(), n_times));
    let mut offset = 0;
    for buf in &buffers {
        if let Chunk::Data(tag) = buf.chunk {
            let block = decode_buffer(reader, &tag, buf.n_samp, &cals)?;
            data.slice_mut(s![.., offset..offset + buf.n_samp]).assign(&block);
        }
        offset += buf.n_samp;
    }

    let first_time = first_samp as f64 / info.sfreq;
    let annotations = read_annotations(reader, &tree, first_time)?;
    debug!(
        n_chan = info.n_chan(),
        n_times,
        first_samp,
        buffers = buffers.len(),
        annotations = annotations.len(),
        "fif raw block decoded"
    );
    Ok(RecordingParts { data, ch_names: info.ch_names(), sfreq: info.sfreq, annotations })
}

/// First sample index and the ordered buffer list of a raw-data block.
fn buffer_table<R: Read + Seek>(
    reader: &mut R,
    raw_node: &Node,
    n_chan: usize,
) -> Result<(i64, Vec<BufferRecord>)> {
    if n_chan == 0 {
        bail!("recording has no channels");
    }
    let mut first_samp = match raw_node.find_tag(FIFF_FIRST_SAMPLE) {
        Some(t) => read_i32(reader, t)? as i64,
        None => 0,
    };
    let mut buffers = Vec::new();
    let mut pending_skip = 0_usize;
    let mut leading_skip = 0_usize;

    for ent in &raw_node.entries {
        match ent.kind {
            FIFF_DATA_SKIP => {
                let n = usize::try_from(read_i32(reader, ent)?).unwrap_or(0);
                if buffers.is_empty() {
                    leading_skip += n;
                } else {
                    pending_skip += n;
                }
            }
            FIFF_DATA_BUFFER => {
                let bps = bytes_per_sample(ent.ftype)
                    .ok_or_else(|| anyhow!("unsupported buffer type {}", ent.ftype))?;
                let n_samp = ent.payload_len() / (bps * n_chan);
                if buffers.is_empty() && leading_skip > 0 {
                    first_samp += (leading_skip * n_samp) as i64;
                }
                if pending_skip > 0 {
                    buffers.push(BufferRecord { chunk: Chunk::Gap, n_samp: pending_skip * n_samp });
                    pending_skip = 0;
                }
                buffers.push(BufferRecord { chunk: Chunk::Data(*ent), n_samp });
            }
            _ => {}
        }
    }
    if buffers.is_empty() {
        bail!("raw-data block holds no data buffers");
    }
    Ok((first_samp, buffers))
}

/// One buffer as `[n_chan, n_samp]`, calibrated.
fn decode_buffer<R: Read + Seek>(
    reader: &mut R,
    tag: &TagHeader,
    n_samp: usize,
    cals: &[f64],
) -> Result<Array2<f64>> {
    let n_chan = cals.len();
    let bps = bytes_per_sample(tag.ftype)
        .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
    reader
        .seek(SeekFrom::Start(tag.data_pos()))
        .with_context(|| format!("seek to buffer @ {:#x}", tag.data_pos()))?;
    let mut bytes = vec![0u8; n_samp * n_chan * bps];
    reader.read_exact(&mut bytes).context("read data buffer")?;

    let sample = |i: usize| -> f64 {
        let off = i * bps;
        match tag.ftype {
            FIFFT_FLOAT => be_f32(&bytes, off) as f64,
            FIFFT_INT => be_i32(&bytes, off) as f64,
            FIFFT_DOUBLE => {
                let mut w = [0u8; 8];
                w.copy_from_slice(&bytes[off..off + 8]);
                f64::from_be_bytes(w)
            }
            _ => i16::from_be_bytes([bytes[off], bytes[off + 1]]) as f64,
        }
    };
    Ok(Array2::from_shape_fn((n_chan, n_samp), |(c, t)| sample(t * n_chan + c) * cals[c]))
}
