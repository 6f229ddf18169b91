//! Level and dynamics measurements
//!
//! RMS/peak/crest factor, percentile-based dynamic range over short
//! windows, clipping-run detection, DC offset and a coarse SNR estimate.

use crate::error::AnalysisError;
use crate::io::PcmBuffer;
use serde::{Deserialize, Serialize};

/// Linear amplitude treated as clipped
const CLIP_THRESHOLD: f32 = 0.985;
/// Consecutive clipped samples that count as one clipping event
const CLIP_RUN_MIN: usize = 3;
/// Window length for the short-window RMS series, seconds
const DR_WINDOW_SECONDS: f64 = 0.050;
/// RMS floor below which a window is treated as digital silence
const SILENCE_RMS: f64 = 1e-8;
/// DC offset flagged above this fraction of full scale
const DC_OFFSET_FLAG: f64 = 0.01;

/// Level and dynamics measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicsAnalysis {
    /// Full-buffer RMS level in dB. Negative infinity for silence.
    pub rms_db: f64,

    /// Sample peak in dB. Negative infinity for silence.
    pub peak_db: f64,

    /// Crest factor, `peak_db - rms_db`. Zero for silence.
    pub crest_factor_db: f64,

    /// p95 - p10 of the short-window RMS series, dB
    pub dynamic_range_db: f64,

    /// Number of clipping events (runs of near-full-scale samples)
    pub clipping_events: usize,

    /// Fraction of samples at or above the clip threshold, 0..1
    pub clipped_sample_ratio: f64,

    /// Mean sample value per channel as a fraction of full scale
    pub dc_offset: [f64; 2],

    /// True when either channel's |DC| exceeds 1% of full scale
    pub dc_offset_flagged: bool,

    /// Coarse signal-to-noise estimate: p90 - p10 of window RMS, dB.
    /// Negative infinity when the buffer has no measurable noise floor.
    pub snr_estimate_db: f64,
}

#[inline]
fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

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

/// Count clipping runs across one channel
fn clipping_runs(samples: &[f32]) -> (usize, usize) {
    let mut events = 0usize;
    let mut clipped_samples = 0usize;
    let mut run = 0usize;
    for &s in samples {
        if s.abs() >= CLIP_THRESHOLD {
            run += 1;
            clipped_samples += 1;
        } else {
            if run >= CLIP_RUN_MIN {
                events += 1;
            }
            run = 0;
        }
    }
    if run >= CLIP_RUN_MIN {
        events += 1;
    }
    (events, clipped_samples)
}

/// Measure level and dynamics
pub fn analyze_dynamics(buffer: &PcmBuffer) -> Result<DynamicsAnalysis, AnalysisError> {
    log::debug!(
        "Dynamics: {} samples at {} Hz",
        buffer.len(),
        buffer.sample_rate()
    );

    let mono = buffer.mono_mix();
    let n = mono.len() as f64;

    let sum_sq: f64 = mono.iter().map(|&x| (x as f64) * (x as f64)).sum();
    let rms = (sum_sq / n).sqrt();
    let peak = mono.iter().map(|&x| (x as f64).abs()).fold(0.0f64, f64::max);

    let rms_db = linear_to_db(rms);
    let peak_db = linear_to_db(peak);
    let crest_factor_db = if rms_db.is_finite() && peak_db.is_finite() {
        peak_db - rms_db
    } else {
        0.0
    };

    // Clipping measured per channel so asymmetric clipping is not
    // averaged away by the mono mix
    let (events_l, clipped_l) = clipping_runs(buffer.left());
    let (events_r, clipped_r) = clipping_runs(buffer.right());
    let clipping_events = events_l + events_r;
    let clipped_sample_ratio = (clipped_l + clipped_r) as f64 / (2.0 * n);

    // DC offset per channel
    let dc_l = buffer.left().iter().map(|&x| x as f64).sum::<f64>() / n;
    let dc_r = buffer.right().iter().map(|&x| x as f64).sum::<f64>() / n;
    let dc_offset = [dc_l, dc_r];
    let dc_offset_flagged = dc_l.abs() > DC_OFFSET_FLAG || dc_r.abs() > DC_OFFSET_FLAG;

    // Short-window RMS series for percentile statistics
    let window = ((buffer.sample_rate() as f64 * DR_WINDOW_SECONDS) as usize).max(1);
    let hop = (window / 2).max(1);
    let mut window_rms_db: Vec<f64> = Vec::new();
    let mut start = 0usize;
    while start + window <= mono.len() {
        let chunk = &mono[start..start + window];
        let rms = (chunk.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>()
            / window as f64)
            .sqrt();
        if rms > SILENCE_RMS {
            window_rms_db.push(linear_to_db(rms));
        }
        start += hop;
    }
    window_rms_db.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (dynamic_range_db, snr_estimate_db) = if window_rms_db.len() < 4 {
        (0.0, f64::NEG_INFINITY)
    } else {
        (
            percentile(&window_rms_db, 95.0) - percentile(&window_rms_db, 10.0),
            percentile(&window_rms_db, 90.0) - percentile(&window_rms_db, 10.0),
        )
    };

    if rms_db.is_infinite() {
        log::warn!("Dynamics: buffer is digital silence");
    }

    Ok(DynamicsAnalysis {
        rms_db,
        peak_db,
        crest_factor_db,
        dynamic_range_db,
        clipping_events,
        clipped_sample_ratio,
        dc_offset,
        dc_offset_flagged,
        snr_estimate_db,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn stereo_sine(freq: f32, amp: f32, rate: u32, secs: f32) -> PcmBuffer {
        let samples: Vec<f32> = (0..(rate as f32 * secs) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * amp)
            .collect();
        PcmBuffer::new(samples.clone(), samples, rate).unwrap()
    }

    #[test]
    fn test_sine_levels() {
        // 1 kHz at 0.7: peak ~-3.1 dB, RMS ~-6.1 dB, crest ~3.0 dB
        let buffer = stereo_sine(1000.0, 0.7, 44100, 2.0);
        let result = analyze_dynamics(&buffer).unwrap();

        assert!((result.peak_db - (-3.098)).abs() < 0.1, "peak {:.2}", result.peak_db);
        assert!((result.rms_db - (-6.108)).abs() < 0.1, "rms {:.2}", result.rms_db);
        assert!(
            (result.crest_factor_db - 3.01).abs() < 0.1,
            "crest {:.2}",
            result.crest_factor_db
        );
        assert_eq!(result.clipping_events, 0);
    }

    #[test]
    fn test_silence() {
        let buffer = PcmBuffer::new(vec![0.0; 44100], vec![0.0; 44100], 44100).unwrap();
        let result = analyze_dynamics(&buffer).unwrap();
        assert!(result.rms_db.is_infinite() && result.rms_db < 0.0);
        assert!(result.peak_db.is_infinite() && result.peak_db < 0.0);
        assert_eq!(result.crest_factor_db, 0.0);
        assert_eq!(result.clipping_events, 0);
        assert_eq!(result.dynamic_range_db, 0.0);
    }

    #[test]
    fn test_clipping_detection() {
        let mut samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();
        // Two separate clipping runs
        for s in samples[100..150].iter_mut() {
            *s = 1.0;
        }
        for s in samples[5000..5040].iter_mut() {
            *s = -1.0;
        }
        let buffer = PcmBuffer::new(samples.clone(), samples, 44100).unwrap();
        let result = analyze_dynamics(&buffer).unwrap();
        assert_eq!(result.clipping_events, 4, "two runs per channel");
        assert!(result.clipped_sample_ratio > 0.001);
    }

    #[test]
    fn test_isolated_full_scale_sample_is_not_an_event() {
        let mut samples = vec![0.0f32; 44100];
        samples[1000] = 1.0;
        let buffer = PcmBuffer::new(samples.clone(), samples, 44100).unwrap();
        let result = analyze_dynamics(&buffer).unwrap();
        assert_eq!(result.clipping_events, 0);
    }

    #[test]
    fn test_dc_offset_detection() {
        let clean = stereo_sine(1000.0, 0.5, 44100, 1.0);
        let clean_result = analyze_dynamics(&clean).unwrap();
        assert!(clean_result.dc_offset[0].abs() < 0.01);
        assert!(!clean_result.dc_offset_flagged);

        let biased: Vec<f32> = (0..44100)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / 44100.0).sin() * 0.5 + 0.05)
            .collect();
        let buffer = PcmBuffer::new(biased.clone(), biased, 44100).unwrap();
        let result = analyze_dynamics(&buffer).unwrap();
        assert!(
            result.dc_offset[0] > 0.03,
            "5% bias should measure >3%, got {:.4}",
            result.dc_offset[0]
        );
        assert!(result.dc_offset_flagged);
    }

    #[test]
    fn test_dynamic_range_of_two_level_signal() {
        // 1 s loud + 1 s quiet: DR should be near the 20 dB level step
        let rate = 44100u32;
        let mut samples: Vec<f32> = (0..rate as usize)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        samples.extend(
            (0..rate as usize)
                .map(|i| (2.0 * PI * 500.0 * i as f32 / rate as f32).sin() * 0.05),
        );
        let buffer = PcmBuffer::new(samples.clone(), samples, rate).unwrap();
        let result = analyze_dynamics(&buffer).unwrap();
        assert!(
            result.dynamic_range_db > 15.0 && result.dynamic_range_db < 25.0,
            "DR {:.1} dB, expected ~20",
            result.dynamic_range_db
        );
    }
}
