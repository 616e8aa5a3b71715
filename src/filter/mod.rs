//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc band-pass / band-stop design with
//!   MNE's automatic transition bandwidths and filter length.
//! - [`apply`]: overlap-add zero-phase convolution.

pub mod apply;
pub mod design;

pub use apply::{filter_1d, filter_data};
pub use design::{
    auto_filter_length, auto_h_trans_bandwidth, auto_l_trans_bandwidth, design_bandpass,
    design_bandstop, firwin, gain_at, hamming,
};
