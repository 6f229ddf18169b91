//! Stereo image analysis
//!
//! Channel correlation, mid/side width, balance, local-window phase
//! coherence and per-band variants of the same measurements.

use crate::error::AnalysisError;
use crate::features::filters::band_limit;
use crate::io::PcmBuffer;
use serde::{Deserialize, Serialize};

/// Windows used for the local-coherence scan
const COHERENCE_WINDOWS: usize = 20;

/// Variance floor treated as a silent channel
const SILENCE_VARIANCE: f64 = 1e-12;

/// Bands for the per-band stereo metrics (same edges as tonal balance)
const STEREO_BANDS: [(&str, f64, f64); 4] = [
    ("sub", 20.0, 60.0),
    ("low", 60.0, 250.0),
    ("mid", 250.0, 4000.0),
    ("high", 4000.0, 20000.0),
];

/// Mono downmix compatibility rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonoCompatibility {
    /// Correlation >= 0.95
    Excellent,
    /// Correlation >= 0.8
    Good,
    /// Correlation >= 0.5
    Fair,
    /// Anything lower, including anti-phase content
    Poor,
}

impl MonoCompatibility {
    fn from_correlation(correlation: f64) -> Self {
        if correlation >= 0.95 {
            MonoCompatibility::Excellent
        } else if correlation >= 0.8 {
            MonoCompatibility::Good
        } else if correlation >= 0.5 {
            MonoCompatibility::Fair
        } else {
            MonoCompatibility::Poor
        }
    }
}

/// Stereo metrics for one frequency band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandStereo {
    /// Band label (sub/low/mid/high)
    pub band: String,
    /// Band-limited channel correlation, [-1, 1]
    pub correlation: f64,
    /// Band-limited width, [0, 2]
    pub width: f64,
}

/// Stereo measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StereoAnalysis {
    /// Pearson correlation between channels, clamped to [-1, 1].
    /// Defined as 0.0 when both channels are silent.
    pub correlation: f64,

    /// sqrt(side energy / mid energy), clamped to [0, 2]
    pub width: f64,

    /// 20*log10(rmsL / rmsR), dB. Infinite when exactly one channel is
    /// silent; the boundary serializes that as null.
    pub balance_db: f64,

    /// max(0, mean windowed correlation) * (1 - sqrt(correlation variance))
    pub phase_coherence: f64,

    /// Categorical mono-downmix rating from the global correlation
    pub mono_compatibility: MonoCompatibility,

    /// Per-band correlation and width
    pub bands: Vec<BandStereo>,
}

/// Pearson correlation over one span of both channels
///
/// A silent channel has no linear relationship to measure, so any span
/// involving one reports 0 rather than NaN.
fn correlation_span(left: &[f32], right: &[f32]) -> f64 {
    let n = left.len() as f64;
    if left.is_empty() {
        return 0.0;
    }
    let mut sum_l = 0.0f64;
    let mut sum_r = 0.0f64;
    let mut sum_ll = 0.0f64;
    let mut sum_rr = 0.0f64;
    let mut sum_lr = 0.0f64;
    for (&l, &r) in left.iter().zip(right.iter()) {
        let l = l as f64;
        let r = r as f64;
        sum_l += l;
        sum_r += r;
        sum_ll += l * l;
        sum_rr += r * r;
        sum_lr += l * r;
    }
    let mean_l = sum_l / n;
    let mean_r = sum_r / n;
    let var_l = sum_ll / n - mean_l * mean_l;
    let var_r = sum_rr / n - mean_r * mean_r;
    let cov = sum_lr / n - mean_l * mean_r;

    if var_l <= SILENCE_VARIANCE || var_r <= SILENCE_VARIANCE {
        0.0
    } else {
        (cov / (var_l.sqrt() * var_r.sqrt())).clamp(-1.0, 1.0)
    }
}

fn width_span(left: &[f32], right: &[f32]) -> f64 {
    let mut mid_energy = 0.0f64;
    let mut side_energy = 0.0f64;
    for (&l, &r) in left.iter().zip(right.iter()) {
        let mid = (l as f64 + r as f64) * 0.5;
        let side = (l as f64 - r as f64) * 0.5;
        mid_energy += mid * mid;
        side_energy += side * side;
    }
    if mid_energy <= SILENCE_VARIANCE {
        if side_energy <= SILENCE_VARIANCE {
            0.0
        } else {
            2.0
        }
    } else {
        (side_energy / mid_energy).sqrt().clamp(0.0, 2.0)
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Analyze the stereo image
pub fn analyze_stereo(buffer: &PcmBuffer) -> Result<StereoAnalysis, AnalysisError> {
    log::debug!(
        "Stereo: {} samples at {} Hz",
        buffer.len(),
        buffer.sample_rate()
    );

    let left = buffer.left();
    let right = buffer.right();

    let correlation = correlation_span(left, right);
    let width = width_span(left, right);

    let rms_l = rms(left);
    let rms_r = rms(right);
    let balance_db = if rms_l <= 0.0 && rms_r <= 0.0 {
        0.0
    } else if rms_r <= 0.0 {
        f64::INFINITY
    } else if rms_l <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * (rms_l / rms_r).log10()
    };

    // Local-window coherence
    let window_len = (left.len() / COHERENCE_WINDOWS).max(1);
    let mut window_correlations: Vec<f64> = Vec::with_capacity(COHERENCE_WINDOWS);
    let mut start = 0usize;
    while start + window_len <= left.len() && window_correlations.len() < COHERENCE_WINDOWS {
        window_correlations.push(correlation_span(
            &left[start..start + window_len],
            &right[start..start + window_len],
        ));
        start += window_len;
    }
    let phase_coherence = if window_correlations.is_empty() {
        0.0
    } else {
        let mean =
            window_correlations.iter().sum::<f64>() / window_correlations.len() as f64;
        let variance = window_correlations
            .iter()
            .map(|&c| (c - mean) * (c - mean))
            .sum::<f64>()
            / window_correlations.len() as f64;
        (mean.max(0.0) * (1.0 - variance.sqrt())).clamp(0.0, 1.0)
    };

    // Per-band metrics over band-limited copies of both channels
    let mut bands = Vec::with_capacity(STEREO_BANDS.len());
    for &(name, low_hz, high_hz) in &STEREO_BANDS {
        let band_l = band_limit(left, buffer.sample_rate(), low_hz, high_hz);
        let band_r = band_limit(right, buffer.sample_rate(), low_hz, high_hz);
        bands.push(BandStereo {
            band: name.to_string(),
            correlation: correlation_span(&band_l, &band_r),
            width: width_span(&band_l, &band_r),
        });
    }

    Ok(StereoAnalysis {
        correlation,
        width,
        balance_db,
        phase_coherence,
        mono_compatibility: MonoCompatibility::from_correlation(correlation),
        bands,
    })
}
