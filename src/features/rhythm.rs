//! Rhythm analysis
//!
//! Onset envelope (high-pass, rectify, smooth), normalized
//! autocorrelation over the BPM search range with a common-tempo prior
//! for tie-breaking, plus transient detection and regularity scoring.

use crate::error::AnalysisError;
use crate::features::filters::Biquad;
use crate::io::PcmBuffer;
use serde::{Deserialize, Serialize};

/// Onset high-pass corner, Hz
const ONSET_HIGHPASS_HZ: f64 = 150.0;
/// Envelope smoothing window, seconds
const SMOOTHING_SECONDS: f64 = 0.010;
/// Envelope rate the lag search runs at, Hz
const ENVELOPE_RATE: f64 = 200.0;
/// Hard BPM bounds regardless of configuration
const BPM_FLOOR: f32 = 50.0;
const BPM_CEIL: f32 = 200.0;
/// Transient threshold percentile of the envelope
const TRANSIENT_PERCENTILE: f64 = 70.0;
/// Minimum gap between transients, seconds
const TRANSIENT_REFRACTORY_SECONDS: f64 = 0.050;
/// Autocorrelation weight in the candidate score
const STRENGTH_WEIGHT: f64 = 0.7;
/// Tempo-prior weight in the candidate score
const PRIOR_WEIGHT: f64 = 0.3;
/// Tempos favored by the prior
const COMMON_BPMS: [f64; 12] = [
    70.0, 80.0, 90.0, 100.0, 110.0, 120.0, 125.0, 128.0, 130.0, 140.0, 150.0, 160.0,
];

const EPSILON: f64 = 1e-10;

/// Rhythm measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhythmAnalysis {
    /// Estimated tempo. `None` when no periodicity stands out.
    pub bpm: Option<f64>,

    /// Tempo confidence, 0..1
    pub bpm_confidence: f64,

    /// Detected transients
    pub transient_count: usize,

    /// Transients per second
    pub transient_density: f64,

    /// 1 - (sigma/mean of inter-transient intervals), clamped to [0, 1]
    pub rhythmic_regularity: f64,
}

/// Onset envelope at the decimated envelope rate
fn onset_envelope(mono: &[f32], sample_rate: u32) -> Vec<f64> {
    let fs = sample_rate as f64;
    let mut highpass = Biquad::high_pass(fs, ONSET_HIGHPASS_HZ, std::f64::consts::FRAC_1_SQRT_2);

    let smooth_len = ((fs * SMOOTHING_SECONDS) as usize).max(1);
    let decimation = ((fs / ENVELOPE_RATE) as usize).max(1);

    // High-pass, rectify, running-sum smooth, decimate in one pass
    let mut window = vec![0.0f64; smooth_len];
    let mut window_sum = 0.0f64;
    let mut window_pos = 0usize;
    let mut envelope = Vec::with_capacity(mono.len() / decimation + 1);

    for (i, &x) in mono.iter().enumerate() {
        let rectified = highpass.process(x as f64).abs();
        window_sum += rectified - window[window_pos];
        window[window_pos] = rectified;
        window_pos = (window_pos + 1) % smooth_len;

        if i % decimation == 0 {
            envelope.push((window_sum / smooth_len as f64).max(0.0));
        }
    }
    envelope
}

/// Normalized autocorrelation of the mean-removed envelope
fn normalized_autocorrelation(envelope: &[f64], max_lag: usize) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = envelope.iter().map(|&e| e - mean).collect();
    let zero_lag: f64 = centered.iter().map(|&e| e * e).sum();

    let mut acf = vec![0.0f64; max_lag + 1];
    if zero_lag < EPSILON {
        return acf;
    }
    for (lag, slot) in acf.iter_mut().enumerate() {
        let mut sum = 0.0f64;
        for i in 0..n - lag {
            sum += centered[i] * centered[i + lag];
        }
        *slot = sum / zero_lag;
    }
    acf
}

/// Proximity of a tempo to the common-BPM prior, octave folds included
fn tempo_prior(bpm: f64) -> f64 {
    let mut best = 0.0f64;
    for &(candidate, weight) in &[(bpm, 1.0f64), (bpm * 2.0, 0.8), (bpm * 0.5, 0.8)] {
        for &common in &COMMON_BPMS {
            let proximity = (-((candidate - common) / 12.0).powi(2)).exp() * weight;
            if proximity > best {
                best = proximity;
            }
        }
    }
    best
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
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

/// Analyze rhythm
///
/// # Arguments
///
/// * `buffer` - Stereo PCM snapshot
/// * `min_bpm` / `max_bpm` - Search range, clamped to [50, 200]
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` on a nonsensical BPM range or a
/// buffer too short to cover two periods of the slowest tempo searched.
pub fn analyze_rhythm(
    buffer: &PcmBuffer,
    min_bpm: f32,
    max_bpm: f32,
) -> Result<RhythmAnalysis, AnalysisError> {
    if min_bpm <= 0.0 || max_bpm <= 0.0 || min_bpm >= max_bpm {
        return Err(AnalysisError::InvalidInput(format!(
            "Invalid BPM range: [{:.1}, {:.1}]",
            min_bpm, max_bpm
        )));
    }
    let min_bpm = min_bpm.max(BPM_FLOOR) as f64;
    let max_bpm = max_bpm.min(BPM_CEIL) as f64;

    log::debug!(
        "Rhythm: {} samples at {} Hz, range [{:.0}, {:.0}] BPM",
        buffer.len(),
        buffer.sample_rate(),
        min_bpm,
        max_bpm
    );

    let mono = buffer.mono_mix();
    let envelope = onset_envelope(&mono, buffer.sample_rate());
    let envelope_rate = buffer.sample_rate() as f64
        / ((buffer.sample_rate() as f64 / ENVELOPE_RATE) as usize).max(1) as f64;

    let lag_min = (envelope_rate * 60.0 / max_bpm).floor() as usize;
    let lag_max = (envelope_rate * 60.0 / min_bpm).ceil() as usize;
    if envelope.len() < 2 * lag_max {
        return Err(AnalysisError::InvalidInput(format!(
            "Buffer too short for BPM search down to {:.0} BPM: {} envelope samples, need {}",
            min_bpm,
            envelope.len(),
            2 * lag_max
        )));
    }

    let acf = normalized_autocorrelation(&envelope, lag_max);

    // Peak-pick local maxima inside the lag range
    let mut candidates: Vec<(f64, f64)> = Vec::new(); // (bpm, strength)
    for lag in lag_min.max(1)..lag_max.min(acf.len().saturating_sub(1)) {
        if acf[lag] > acf[lag - 1] && acf[lag] > acf[lag + 1] && acf[lag] > 0.0 {
            let bpm = envelope_rate * 60.0 / lag as f64;
            if bpm >= min_bpm && bpm <= max_bpm {
                candidates.push((bpm, acf[lag]));
            }
        }
    }

    let (bpm, bpm_confidence) = if candidates.is_empty() {
        log::warn!("Rhythm: no autocorrelation peaks in the BPM search range");
        (None, 0.0)
    } else {
        let mut scored: Vec<(f64, f64, f64)> = candidates
            .iter()
            .map(|&(bpm, strength)| {
                (
                    bpm,
                    strength,
                    STRENGTH_WEIGHT * strength + PRIOR_WEIGHT * tempo_prior(bpm),
                )
            })
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let (winner_bpm, winner_strength, winner_score) = scored[0];
        let mut confidence = winner_strength.clamp(0.0, 1.0);

        // Ambiguity penalty: a rival at a genuinely different tempo with
        // a near-equal score halves the trust in the winner
        let ambiguous = scored[1..].iter().any(|&(bpm, _, score)| {
            (bpm - winner_bpm).abs() > 5.0 && score > winner_score * 0.9
        });
        if ambiguous {
            confidence *= 0.5;
        }
        if (80.0..=140.0).contains(&winner_bpm) {
            confidence = (confidence * 1.1).min(1.0);
        }
        (Some(winner_bpm), confidence)
    };

    // Transient detection on the envelope. The percentile threshold is
    // floored at a fraction of the envelope maximum so sparse material
    // (mostly-silent percussion) still registers its hits.
    let envelope_max = envelope.iter().copied().fold(0.0f64, f64::max);
    let mut sorted_envelope = envelope.clone();
    sorted_envelope.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let threshold =
        percentile(&sorted_envelope, TRANSIENT_PERCENTILE).max(envelope_max * 0.05);
    let refractory = (envelope_rate * TRANSIENT_REFRACTORY_SECONDS).round() as usize;

    let mut transient_positions: Vec<usize> = Vec::new();
    if threshold > EPSILON {
        let mut i = 1usize;
        while i + 1 < envelope.len() {
            if envelope[i] > threshold
                && envelope[i] > envelope[i - 1]
                && envelope[i] >= envelope[i + 1]
                && transient_positions
                    .last()
                    .map_or(true, |&last| i - last >= refractory.max(1))
            {
                transient_positions.push(i);
            }
            i += 1;
        }
    }

    let duration = buffer.duration_seconds();
    let transient_count = transient_positions.len();
    let transient_density = if duration > 0.0 {
        transient_count as f64 / duration
    } else {
        0.0
    };

    let rhythmic_regularity = if transient_positions.len() < 3 {
        0.0
    } else {
        let intervals: Vec<f64> = transient_positions
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64)
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let variance = intervals
            .iter()
            .map(|&iv| (iv - mean) * (iv - mean))
            .sum::<f64>()
            / intervals.len() as f64;
        if mean < EPSILON {
            0.0
        } else {
            (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
        }
    };

    Ok(RhythmAnalysis {
        bpm,
        bpm_confidence,
        transient_count,
        transient_density,
        rhythmic_regularity,
    })
}
