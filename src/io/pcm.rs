//! Decoded PCM input buffer

use crate::error::AnalysisError;

/// Immutable stereo PCM snapshot
///
/// Two equal-length channels of normalized float samples (nominal range
/// [-1.0, 1.0], momentary overshoot allowed) plus the sample rate. Mono
/// sources are represented by duplicating the single channel into both
/// before this type is constructed; that normalization belongs to the
/// decode collaborator, not this crate.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Build a validated buffer
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` if the channels differ in
    /// length, the buffer is empty, or the sample rate is zero. These are
    /// the fatal-input cases: nothing downstream can run without them.
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if left.len() != right.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "Channel length mismatch: left={}, right={}",
                left.len(),
                right.len()
            )));
        }
        if left.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "Empty audio buffer".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput(
                "Invalid sample rate: 0".to_string(),
            ));
        }
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Left channel samples
    pub fn left(&self) -> &[f32] {
        &self.left
    }

    /// Right channel samples
    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True when the buffer holds no samples (never true for a
    /// constructed buffer; kept for API completeness)
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds, derived from length and rate
    pub fn duration_seconds(&self) -> f64 {
        self.left.len() as f64 / self.sample_rate as f64
    }

    /// Mono mix, (L + R) / 2 per sample
    pub fn mono_mix(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(self.right.iter())
            .map(|(&l, &r)| (l + r) * 0.5)
            .collect()
    }
}
