//! Reader for MNE-style `.fif` raw recordings.
//!
//! Only what the pipeline consumes is decoded: channel names, calibration,
//! sampling rate, the continuous data buffers and the annotation block.
//! Gzip-compressed files are not supported.
//!
//! ```no_run
//! let parts = lbci::fiff::read_raw(std::path::Path::new("session_raw.fif"))?;
//! println!("{} channels @ {} Hz", parts.ch_names.len(), parts.sfreq);
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod annotations;
pub mod constants;
pub mod info;
pub mod raw;
pub mod tag;
pub mod tree;

pub use annotations::read_annotations;
pub use info::{read_meas_info, ChannelInfo, MeasInfo};
pub use raw::{read_raw, read_raw_from};
pub use tag::{read_tag_header, TagHeader};
pub use tree::{read_tree, scan_directory, try_load_directory, Node};
