//! Measurement info: the channel table and sampling rate.
use std::io::{Read, Seek};

use anyhow::{anyhow, bail, Result};

use super::constants::*;
use super::tag::{be_f32, be_i32, read_f64, read_i32, read_i32_array, read_payload};
use super::tree::Node;

/// Size of a `FIFFT_CH_INFO_STRUCT` payload.
pub const CH_INFO_LEN: usize = 96;

/// One channel record.
///
/// Payload layout (big-endian): scanno, logno, kind (i32), range, cal (f32),
/// coil_type (i32), loc (12 × f32), unit, unit_mul (i32), name (16 bytes).
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: i32,
    pub range: f32,
    pub cal: f32,
}

impl ChannelInfo {
    /// Multiplier from stored sample to physical unit.
    #[inline]
    pub fn calibration(&self) -> f64 {
        self.cal as f64 * self.range as f64
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < CH_INFO_LEN {
            bail!("channel record is {} bytes, need {CH_INFO_LEN}", raw.len());
        }
        let name = raw[80..96]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();
        Ok(Self { name, kind: be_i32(raw, 8), range: be_f32(raw, 12), cal: be_f32(raw, 16) })
    }
}

#[derive(Debug, Clone)]
pub struct MeasInfo {
    pub sfreq: f64,
    pub chs: Vec<ChannelInfo>,
    /// Seconds and microseconds since the epoch, when recorded.
    pub meas_date: Option<(i32, i32)>,
}

impl MeasInfo {
    pub fn n_chan(&self) -> usize {
        self.chs.len()
    }

    pub fn cals(&self) -> Vec<f64> {
        self.chs.iter().map(ChannelInfo::calibration).collect()
    }

    pub fn ch_names(&self) -> Vec<String> {
        self.chs.iter().map(|c| c.name.clone()).collect()
    }
}

pub fn read_meas_info<R: Read + Seek>(reader: &mut R, tree: &Node) -> Result<MeasInfo> {
    let info_node = tree
        .find_block(FIFFB_MEAS)
        .and_then(|m| m.find_block(FIFFB_MEAS_INFO))
        .ok_or_else(|| anyhow!("FIFFB_MEAS_INFO block not found"))?;

    let mut n_chan = None;
    let mut sfreq = None;
    let mut meas_date = None;
    let mut chs = Vec::new();
    for ent in &info_node.entries {
        match ent.kind {
            FIFF_NCHAN => n_chan = Some(read_i32(reader, ent)?),
            FIFF_SFREQ => sfreq = Some(read_f64(reader, ent)?),
            FIFF_MEAS_DATE => {
                if let [secs, usecs, ..] = read_i32_array(reader, ent)?[..] {
                    meas_date = Some((secs, usecs));
                }
            }
            FIFF_CH_INFO => chs.push(ChannelInfo::from_bytes(&read_payload(reader, ent)?)?),
            _ => {}
        }
    }

    let n_chan = n_chan.ok_or_else(|| anyhow!("FIFF_NCHAN missing"))?;
    let sfreq = sfreq.ok_or_else(|| anyhow!("FIFF_SFREQ missing"))?;
    if usize::try_from(n_chan).ok() != Some(chs.len()) {
        bail!("FIFF_NCHAN says {n_chan} channels but {} records were found", chs.len());
    }
    if !(sfreq.is_finite() && sfreq > 0.0) {
        bail!("invalid sampling rate {sfreq}");
    }
    Ok(MeasInfo { sfreq, chs, meas_date })
}
