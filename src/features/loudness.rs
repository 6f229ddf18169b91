//! ITU-R BS.1770-class loudness meter
//!
//! K-weighting (high-shelf pre-filter cascaded with an RLB high-pass)
//! followed by 400 ms / 75%-overlap block loudness, two-stage gating for
//! the integrated value, an ungated ~3 s short-term series and the
//! percentile loudness range derived from it.

use crate::error::AnalysisError;
use crate::features::filters::Biquad;
use crate::io::PcmBuffer;
use serde::{Deserialize, Serialize};

/// Loudness offset applied after the mean-square log, per BS.1770
const LOUDNESS_OFFSET: f64 = -0.691;

/// Absolute gate threshold in LUFS
const ABSOLUTE_GATE_LUFS: f64 = -70.0;

/// Relative gate offset below the preliminary loudness, in LU
const RELATIVE_GATE_LU: f64 = 10.0;

/// Block length in seconds (momentary window)
const BLOCK_SECONDS: f64 = 0.400;

/// Block overlap fraction
const BLOCK_OVERLAP: f64 = 0.75;

/// Short-term window in seconds
const SHORT_TERM_SECONDS: f64 = 3.0;

// K-weighting reference constants (48 kHz design; the bilinear design is
// rate-parametric so other rates reuse the same closed form).
const PRE_FILTER_HZ: f64 = 1_681.974_450_955_533;
const PRE_FILTER_GAIN_DB: f64 = 3.999_843_853_97;
const PRE_FILTER_Q: f64 = 0.707_175_236_955_419_6;
const RLB_HZ: f64 = 38.135_470_876_024_44;
const RLB_Q: f64 = 0.500_327_037_323_877_3;

/// Loudness measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoudnessAnalysis {
    /// Integrated (gated) loudness in LUFS. Negative infinity when every
    /// block is gated out.
    pub integrated_lufs: f64,

    /// Maximum momentary (400 ms block) loudness in LUFS
    pub max_momentary_lufs: f64,

    /// Maximum short-term (3 s window) loudness in LUFS
    pub max_short_term_lufs: f64,

    /// Loudness range: p95 - p10 of the short-term series, in LU
    pub loudness_range_lu: f64,

    /// Gain margin to the reference level, `reference - integrated`, dB
    pub headroom_db: f64,

    /// Reference level the headroom is measured against, LUFS
    pub reference_lufs: f64,

    /// Total number of measurement blocks
    pub block_count: usize,

    /// Blocks removed by the two-stage gate
    pub gated_block_count: usize,
}

/// K-weight one channel: pre-filter shelf, then RLB high-pass
fn k_weight(samples: &[f32], sample_rate: f64) -> Vec<f64> {
    let mut shelf = Biquad::high_shelf(sample_rate, PRE_FILTER_HZ, PRE_FILTER_GAIN_DB, PRE_FILTER_Q);
    let mut rlb = Biquad::high_pass(sample_rate, RLB_HZ, RLB_Q);
    samples
        .iter()
        .map(|&x| rlb.process(shelf.process(x as f64)))
        .collect()
}

#[inline]
fn mean_square_to_lufs(mean_square: f64) -> f64 {
    if mean_square <= 0.0 {
        f64::NEG_INFINITY
    } else {
        LOUDNESS_OFFSET + 10.0 * mean_square.log10()
    }
}

/// Percentile of an ascending-sorted slice, linear interpolation
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NEG_INFINITY;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Measure loudness
///
/// # Arguments
///
/// * `buffer` - Stereo PCM snapshot
/// * `reference_lufs` - Level the headroom is reported against
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` when the buffer is shorter than
/// one 400 ms measurement block.
pub fn analyze_loudness(
    buffer: &PcmBuffer,
    reference_lufs: f64,
) -> Result<LoudnessAnalysis, AnalysisError> {
    let sample_rate = buffer.sample_rate() as f64;
    let block_len = (sample_rate * BLOCK_SECONDS).round() as usize;
    let hop_len = (block_len as f64 * (1.0 - BLOCK_OVERLAP)).round() as usize;

    log::debug!(
        "Loudness: {} samples at {} Hz, block={}, hop={}",
        buffer.len(),
        buffer.sample_rate(),
        block_len,
        hop_len
    );

    if buffer.len() < block_len {
        return Err(AnalysisError::InvalidInput(format!(
            "Buffer too short for loudness measurement: {} samples < one {} ms block",
            buffer.len(),
            (BLOCK_SECONDS * 1000.0) as u32
        )));
    }

    let left = k_weight(buffer.left(), sample_rate);
    let right = k_weight(buffer.right(), sample_rate);

    // Per-block mean square, channels summed with unit weights
    let n_blocks = (buffer.len() - block_len) / hop_len + 1;
    let mut block_mean_squares = Vec::with_capacity(n_blocks);
    for block_idx in 0..n_blocks {
        let start = block_idx * hop_len;
        let mut sum = 0.0f64;
        for i in start..start + block_len {
            sum += left[i] * left[i] + right[i] * right[i];
        }
        block_mean_squares.push(sum / block_len as f64);
    }

    let max_momentary_lufs = block_mean_squares
        .iter()
        .map(|&ms| mean_square_to_lufs(ms))
        .fold(f64::NEG_INFINITY, f64::max);

    // Stage 1: absolute gate
    let absolute_survivors: Vec<f64> = block_mean_squares
        .iter()
        .copied()
        .filter(|&ms| mean_square_to_lufs(ms) > ABSOLUTE_GATE_LUFS)
        .collect();

    // Stage 2: relative gate at preliminary - 10 LU
    let mut integrated_lufs = f64::NEG_INFINITY;
    let mut gated_block_count = block_mean_squares.len();
    if !absolute_survivors.is_empty() {
        let preliminary_ms =
            absolute_survivors.iter().sum::<f64>() / absolute_survivors.len() as f64;
        let relative_threshold = mean_square_to_lufs(preliminary_ms) - RELATIVE_GATE_LU;
        let survivors: Vec<f64> = absolute_survivors
            .iter()
            .copied()
            .filter(|&ms| mean_square_to_lufs(ms) > relative_threshold)
            .collect();
        if !survivors.is_empty() {
            integrated_lufs =
                mean_square_to_lufs(survivors.iter().sum::<f64>() / survivors.len() as f64);
            gated_block_count = block_mean_squares.len() - survivors.len();
        }
    }

    // Short-term: trailing 3 s mean of block mean squares, ungated
    let blocks_per_short_term =
        (((SHORT_TERM_SECONDS - BLOCK_SECONDS) / (BLOCK_SECONDS * (1.0 - BLOCK_OVERLAP))).round()
            as usize
            + 1)
        .max(1);
    let mut short_term_lufs: Vec<f64> = Vec::new();
    if block_mean_squares.len() >= blocks_per_short_term {
        for end in blocks_per_short_term..=block_mean_squares.len() {
            let window = &block_mean_squares[end - blocks_per_short_term..end];
            let ms = window.iter().sum::<f64>() / window.len() as f64;
            short_term_lufs.push(mean_square_to_lufs(ms));
        }
    } else {
        // Buffer shorter than 3 s: single window over what exists
        let ms = block_mean_squares.iter().sum::<f64>() / block_mean_squares.len() as f64;
        short_term_lufs.push(mean_square_to_lufs(ms));
    }

    let max_short_term_lufs = short_term_lufs
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    // LRA over valid (above absolute gate) short-term values
    let mut valid_short_term: Vec<f64> = short_term_lufs
        .iter()
        .copied()
        .filter(|l| l.is_finite() && *l > ABSOLUTE_GATE_LUFS)
        .collect();
    valid_short_term.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let loudness_range_lu = if valid_short_term.len() < 2 {
        0.0
    } else {
        percentile(&valid_short_term, 95.0) - percentile(&valid_short_term, 10.0)
    };

    let headroom_db = reference_lufs - integrated_lufs;

    if integrated_lufs.is_infinite() {
        log::warn!("Loudness: every block gated out, integrated loudness is -inf");
    }

    Ok(LoudnessAnalysis {
        integrated_lufs,
        max_momentary_lufs,
        max_short_term_lufs,
        loudness_range_lu,
        headroom_db,
        reference_lufs,
        block_count: block_mean_squares.len(),
        gated_block_count,
    })
}
