//! MNE annotation block.
//!
//! Onsets and ends are stored as parallel float arrays and descriptions as
//! one `:`-joined string. When the annotations carry an origin time their
//! onsets count from the measurement start, so the recording's first sample
//! time is subtracted to make them relative to the first stored sample.
use std::io::{Read, Seek};

use anyhow::{bail, Result};

use super::constants::*;
use super::tag::{read_f32_array, read_i32_array, read_string};
use super::tree::Node;
use crate::annotation::Annotation;

/// Annotations in onset order, or empty when the file has no annotation block.
pub fn read_annotations<R: Read + Seek>(
    reader: &mut R,
    tree: &Node,
    first_time: f64,
) -> Result<Vec<Annotation>> {
    let Some(node) = tree.find_block(FIFFB_MNE_ANNOTATIONS) else {
        return Ok(Vec::new());
    };

    let mut onsets = Vec::new();
    let mut ends = Vec::new();
    let mut descriptions = Vec::new();
    let mut orig_time = false;
    for ent in &node.entries {
        match ent.kind {
            FIFF_MNE_BASELINE_MIN => onsets = read_f32_array(reader, ent)?,
            FIFF_MNE_BASELINE_MAX => ends = read_f32_array(reader, ent)?,
            FIFF_COMMENT => {
                descriptions = read_string(reader, ent)?.split(':').map(str::to_string).collect()
            }
            FIFF_MEAS_DATE => orig_time = !read_i32_array(reader, ent)?.is_empty(),
            _ => {}
        }
    }
    if onsets.is_empty() {
        return Ok(Vec::new());
    }
    if onsets.len() != ends.len() || onsets.len() != descriptions.len() {
        bail!(
            "annotation arrays disagree: {} onsets, {} ends, {} descriptions",
            onsets.len(),
            ends.len(),
            descriptions.len()
        );
    }

    let shift = if orig_time { first_time } else { 0.0 };
    let mut out: Vec<Annotation> = onsets
        .iter()
        .zip(&ends)
        .zip(descriptions)
        .map(|((&on, &end), desc)| {
            let onset = on as f64 - shift;
            Annotation::new(onset, (end - on).max(0.0) as f64, desc)
        })
        .collect();
    out.sort_by(|a, b| a.onset.total_cmp(&b.onset));
    Ok(out)
}
