//! # mixprobe-dsp
//!
//! An audio metrics analysis engine. Hand it a decoded stereo PCM
//! buffer and it produces loudness, peak, spectral, stereo-imaging,
//! tonal and rhythmic measurements plus derived quality diagnostics.
//!
//! ## Features
//!
//! - **Loudness**: BS.1770-class K-weighted, gated integration (LUFS,
//!   LRA, headroom)
//! - **True peak**: 4x polyphase oversampled inter-sample peak search
//! - **Dynamics**: RMS/peak/crest, percentile dynamic range, clipping
//!   and DC-offset detection
//! - **Spectral**: centroid, rolloff, flux, harmonicity, envelope shape
//! - **Stereo**: correlation, width, balance, phase coherence, per-band
//!   imaging
//! - **Tonal balance**: four-band level profile with categorical
//!   descriptors
//! - **Rhythm**: autocorrelation tempo estimation, transients,
//!   regularity
//! - **Key**: chroma folding with Krumhansl-Schmuckler template matching
//!
//! ## Quick Start
//!
//! ```no_run
//! use mixprobe_dsp::{analyze, AnalysisOptions, PcmBuffer};
//!
//! let left: Vec<f32> = vec![]; // Decoded samples, normalized
//! let right: Vec<f32> = vec![];
//! let buffer = PcmBuffer::new(left, right, 48000)?;
//!
//! let result = analyze(&buffer, &AnalysisOptions::default())?;
//! println!("Mix health: {:.0}/100", result.mix_health);
//! # Ok::<(), mixprobe_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! PcmBuffer -> independent feature analyzers -> orchestrator merge -> AnalysisResult
//! ```
//!
//! Analyzers are pure functions of the immutable snapshot and run in
//! parallel; one analyzer failing or overrunning its budget degrades
//! only its own field in the result. Decoding, resampling and channel
//! normalization are collaborator responsibilities upstream of this
//! crate; serialization of the result tree is plain serde.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod transform;

// Re-export main types
pub use analysis::result::{AnalysisResult, FeatureResult, Key};
pub use config::{AnalysisOptions, FeatureSet, Quality};
pub use error::AnalysisError;
pub use io::PcmBuffer;

/// Analyze one PCM buffer
///
/// Runs every analyzer enabled in `options` against the snapshot and
/// merges the outcomes. The call fails only on fatal input invariants
/// (those are enforced when the [`PcmBuffer`] is built, so in practice
/// this returns `Ok` with per-feature failures recorded inside).
///
/// # Example
///
/// ```
/// use mixprobe_dsp::{analyze, AnalysisOptions, PcmBuffer};
///
/// let samples = vec![0.1f32; 48000];
/// let buffer = PcmBuffer::new(samples.clone(), samples, 48000)?;
/// let result = analyze(&buffer, &AnalysisOptions::default())?;
/// assert!(result.dynamics.is_some());
/// # Ok::<(), mixprobe_dsp::AnalysisError>(())
/// ```
pub fn analyze(
    buffer: &PcmBuffer,
    options: &AnalysisOptions,
) -> Result<AnalysisResult, AnalysisError> {
    log::debug!(
        "Starting analysis: {} samples at {} Hz ({:.2} s)",
        buffer.len(),
        buffer.sample_rate(),
        buffer.duration_seconds()
    );
    analysis::orchestrator::run(buffer, options)
}
