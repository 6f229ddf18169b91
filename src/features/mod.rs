//! Feature extraction modules
//!
//! One module per analyzer in the pipeline:
//! - Loudness metering (BS.1770-class gated integration)
//! - True-peak detection (4x polyphase oversampling)
//! - Level/dynamics measurement
//! - Spectral features
//! - Stereo imaging
//! - Tonal balance
//! - Rhythm (tempo + transients)
//! - Musical key

pub mod dynamics;
pub mod filters;
pub mod key;
pub mod loudness;
pub mod rhythm;
pub mod spectral;
pub mod stereo;
pub mod tonal_balance;
pub mod true_peak;
