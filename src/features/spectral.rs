//! Spectral feature extraction
//!
//! Centroid, percentile rolloff, spectral flux, harmonic structure and
//! spectral-envelope statistics, all derived from one STFT of the mono
//! mix.

use crate::config::Quality;
use crate::error::AnalysisError;
use crate::io::PcmBuffer;
use crate::transform::{Stft, StftResult, WindowKind};
use serde::{Deserialize, Serialize};

/// Fundamental search window, Hz
const FUNDAMENTAL_MIN_HZ: f32 = 80.0;
const FUNDAMENTAL_MAX_HZ: f32 = 1000.0;
/// Harmonic multiples searched above the fundamental
const HARMONIC_COUNT: usize = 6;
/// Relative search width around each ideal harmonic
const HARMONIC_TOLERANCE: f32 = 0.05;

/// Floor for energy ratios expressed in dB
const MIN_ENERGY: f64 = 1e-12;
/// dB floor substituted for empty bins in envelope statistics
const DB_FLOOR: f64 = -120.0;

/// Rolloff measurement at one percentile
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RolloffPoint {
    /// Cumulative-energy percentile, percent
    pub percentile: f32,
    /// Lowest frequency at which the cumulative energy reaches it, Hz
    pub frequency_hz: f32,
}

/// Spectral measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralAnalysis {
    /// Energy-weighted mean frequency of the averaged power spectrum,
    /// DC bin excluded, Hz. Zero for silence.
    pub centroid_hz: f64,

    /// Rolloff frequencies at the requested percentiles
    pub rolloffs: Vec<RolloffPoint>,

    /// Mean half-wave-rectified frame-to-frame magnitude difference
    pub flux: f64,

    /// Detected fundamental frequency, Hz. `None` when no peak stands
    /// out in the search window.
    pub fundamental_hz: Option<f64>,

    /// Harmonic-aligned energy over total energy in the searched range,
    /// 0..1
    pub harmonic_ratio: f64,

    /// Mean relative deviation of detected harmonics from ideal integer
    /// multiples, 0..~0.05
    pub inharmonicity: f64,

    /// Low-half over high-half energy, dB
    pub tilt_db: f64,

    /// Linear-regression slope of dB magnitude against log2 frequency,
    /// dB per octave
    pub slope_db_per_octave: f64,

    /// Fourth standardized moment of the dB spectrum
    pub kurtosis: f64,
}

/// Extract spectral features
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` when the buffer is shorter than
/// one analysis frame.
pub fn analyze_spectral(
    buffer: &PcmBuffer,
    quality: Quality,
    rolloff_percentiles: &[f32],
) -> Result<SpectralAnalysis, AnalysisError> {
    let mono = buffer.mono_mix();
    let stft = Stft::new(quality.fft_size(), quality.hop_size(), WindowKind::Hann)?;
    let spectrum = stft.process(&mono, buffer.sample_rate())?;

    log::debug!(
        "Spectral: {} frames, {} bins",
        spectrum.spectrogram.len(),
        spectrum.freq_bins.len()
    );

    let centroid_hz = centroid(&spectrum);
    let rolloffs = rolloff_points(&spectrum, rolloff_percentiles);
    let flux = spectral_flux(&spectrum.spectrogram);
    let (fundamental_hz, harmonic_ratio, inharmonicity) = harmonic_structure(&spectrum);
    let (tilt_db, slope_db_per_octave, kurtosis) = envelope_statistics(&spectrum);

    Ok(SpectralAnalysis {
        centroid_hz,
        rolloffs,
        flux,
        fundamental_hz,
        harmonic_ratio,
        inharmonicity,
        tilt_db,
        slope_db_per_octave,
        kurtosis,
    })
}

fn centroid(spectrum: &StftResult) -> f64 {
    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for (bin, &power) in spectrum.averaged_power_spectrum.iter().enumerate().skip(1) {
        weighted += spectrum.freq_bins[bin] as f64 * power as f64;
        total += power as f64;
    }
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

fn rolloff_points(spectrum: &StftResult, percentiles: &[f32]) -> Vec<RolloffPoint> {
    let total: f64 = spectrum
        .averaged_power_spectrum
        .iter()
        .skip(1)
        .map(|&p| p as f64)
        .sum();

    percentiles
        .iter()
        .map(|&percentile| {
            if total <= 0.0 {
                return RolloffPoint {
                    percentile,
                    frequency_hz: 0.0,
                };
            }
            let target = total * percentile as f64 / 100.0;
            let mut cumulative = 0.0f64;
            let mut frequency_hz = *spectrum.freq_bins.last().unwrap_or(&0.0);
            for (bin, &power) in spectrum.averaged_power_spectrum.iter().enumerate().skip(1) {
                cumulative += power as f64;
                if cumulative >= target {
                    frequency_hz = spectrum.freq_bins[bin];
                    break;
                }
            }
            RolloffPoint {
                percentile,
                frequency_hz,
            }
        })
        .collect()
}

fn spectral_flux(spectrogram: &[Vec<f32>]) -> f64 {
    if spectrogram.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0f64;
    for pair in spectrogram.windows(2) {
        let mut frame_flux = 0.0f64;
        for (&prev, &curr) in pair[0].iter().zip(pair[1].iter()) {
            let diff = curr - prev;
            if diff > 0.0 {
                frame_flux += diff as f64;
            }
        }
        total += frame_flux;
    }
    total / (spectrogram.len() - 1) as f64
}

/// Locate the fundamental and its harmonic series
fn harmonic_structure(spectrum: &StftResult) -> (Option<f64>, f64, f64) {
    let power = &spectrum.averaged_power_spectrum;
    let bin_hz = if spectrum.freq_bins.len() > 1 {
        spectrum.freq_bins[1]
    } else {
        return (None, 0.0, 0.0);
    };

    let min_bin = (FUNDAMENTAL_MIN_HZ / bin_hz).ceil() as usize;
    let max_bin = ((FUNDAMENTAL_MAX_HZ / bin_hz).floor() as usize).min(power.len() - 1);
    if min_bin >= max_bin {
        return (None, 0.0, 0.0);
    }

    // Strongest local peak in the fundamental window
    let mut best_bin = 0usize;
    let mut best_power = 0.0f32;
    for bin in min_bin..=max_bin {
        if power[bin] > best_power {
            best_power = power[bin];
            best_bin = bin;
        }
    }
    if best_power <= 0.0 {
        return (None, 0.0, 0.0);
    }

    let fundamental_hz = spectrum.freq_bins[best_bin] as f64;

    let mut harmonic_energy = 0.0f64;
    let mut deviations: Vec<f64> = Vec::new();
    let mut searched_top_bin = best_bin;

    for multiple in 1..=HARMONIC_COUNT {
        let ideal_bin = best_bin * multiple;
        let half_width = ((ideal_bin as f32 * HARMONIC_TOLERANCE).ceil() as usize).max(1);
        let lo = ideal_bin.saturating_sub(half_width);
        let hi = (ideal_bin + half_width).min(power.len() - 1);
        if lo >= power.len() || lo >= hi {
            break;
        }
        searched_top_bin = hi;

        // Local maximum inside the tolerance window
        let (peak_bin, peak_power) = power[lo..=hi]
            .iter()
            .enumerate()
            .map(|(i, &p)| (lo + i, p))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((ideal_bin, 0.0));

        if peak_power > 0.0 {
            // Count the main lobe (peak bin and immediate neighbors) as
            // harmonic-aligned energy
            let lobe_lo = peak_bin.saturating_sub(1);
            let lobe_hi = (peak_bin + 1).min(power.len() - 1);
            harmonic_energy += power[lobe_lo..=lobe_hi]
                .iter()
                .map(|&p| p as f64)
                .sum::<f64>();
            let ideal_hz = fundamental_hz * multiple as f64;
            let found_hz = spectrum.freq_bins[peak_bin] as f64;
            deviations.push((found_hz - ideal_hz).abs() / ideal_hz);
        }
    }

    let range_energy: f64 = power[min_bin..=searched_top_bin]
        .iter()
        .map(|&p| p as f64)
        .sum();
    let harmonic_ratio = if range_energy > 0.0 {
        (harmonic_energy / range_energy).min(1.0)
    } else {
        0.0
    };
    let inharmonicity = if deviations.is_empty() {
        0.0
    } else {
        deviations.iter().sum::<f64>() / deviations.len() as f64
    };

    (Some(fundamental_hz), harmonic_ratio, inharmonicity)
}

/// Tilt, regression slope and kurtosis of the dB spectrum
fn envelope_statistics(spectrum: &StftResult) -> (f64, f64, f64) {
    let power = &spectrum.averaged_power_spectrum;
    let n_bins = power.len();
    if n_bins < 4 {
        return (0.0, 0.0, 0.0);
    }

    let half = n_bins / 2;
    let low_energy: f64 = power[1..half].iter().map(|&p| p as f64).sum();
    let high_energy: f64 = power[half..].iter().map(|&p| p as f64).sum();
    let tilt_db = 10.0 * (low_energy.max(MIN_ENERGY) / high_energy.max(MIN_ENERGY)).log10();

    // Regression of dB magnitude on log2 frequency, DC excluded
    let db_values: Vec<f64> = power
        .iter()
        .skip(1)
        .map(|&p| {
            let p = p as f64;
            if p > MIN_ENERGY {
                10.0 * p.log10()
            } else {
                DB_FLOOR
            }
        })
        .collect();
    let log_freqs: Vec<f64> = spectrum
        .freq_bins
        .iter()
        .skip(1)
        .map(|&f| (f as f64).log2())
        .collect();

    let n = db_values.len() as f64;
    let mean_x = log_freqs.iter().sum::<f64>() / n;
    let mean_y = db_values.iter().sum::<f64>() / n;
    let mut cov = 0.0f64;
    let mut var_x = 0.0f64;
    for (&x, &y) in log_freqs.iter().zip(db_values.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
    }
    let slope_db_per_octave = if var_x > 0.0 { cov / var_x } else { 0.0 };

    // Fourth standardized moment
    let variance = db_values
        .iter()
        .map(|&y| (y - mean_y) * (y - mean_y))
        .sum::<f64>()
        / n;
    let kurtosis = if variance > 0.0 {
        let fourth = db_values
            .iter()
            .map(|&y| (y - mean_y).powi(4))
            .sum::<f64>()
            / n;
        fourth / (variance * variance)
    } else {
        0.0
    };

    (tilt_db, slope_db_per_octave, kurtosis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn stereo(samples: Vec<f32>, rate: u32) -> PcmBuffer {
        PcmBuffer::new(samples.clone(), samples, rate).unwrap()
    }

    fn tone_mix(freqs: &[(f32, f32)], rate: f32, secs: f32) -> Vec<f32> {
        (0..(rate * secs) as usize)
            .map(|i| {
                freqs
                    .iter()
                    .map(|&(f, a)| (2.0 * PI * f * i as f32 / rate).sin() * a)
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_centroid_of_single_tone() {
        let buffer = stereo(tone_mix(&[(1000.0, 0.5)], 44100.0, 1.0), 44100);
        let result = analyze_spectral(&buffer, Quality::Balanced, &[85.0]).unwrap();
        assert!(
            (result.centroid_hz - 1000.0).abs() < 60.0,
            "Centroid {:.1} Hz, expected ~1000",
            result.centroid_hz
        );
    }

    #[test]
    fn test_high_frequency_content_raises_centroid_and_rolloff() {
        let full = stereo(
            tone_mix(&[(300.0, 0.4), (2000.0, 0.3), (9000.0, 0.3)], 44100.0, 1.0),
            44100,
        );
        let narrowed = stereo(tone_mix(&[(300.0, 0.4)], 44100.0, 1.0), 44100);

        let wide = analyze_spectral(&full, Quality::Balanced, &[85.0]).unwrap();
        let narrow = analyze_spectral(&narrowed, Quality::Balanced, &[85.0]).unwrap();

        assert!(
            wide.centroid_hz > narrow.centroid_hz,
            "Centroid must drop when high frequencies are removed: {:.1} vs {:.1}",
            wide.centroid_hz,
            narrow.centroid_hz
        );
        assert!(
            wide.rolloffs[0].frequency_hz > narrow.rolloffs[0].frequency_hz,
            "Rolloff-85 must drop when high frequencies are removed"
        );
    }

    #[test]
    fn test_flux_zero_for_steady_tone() {
        let buffer = stereo(tone_mix(&[(440.0, 0.5)], 44100.0, 2.0), 44100);
        let result = analyze_spectral(&buffer, Quality::Balanced, &[85.0]).unwrap();
        // Steady-state tone: successive frames nearly identical
        assert!(
            result.flux < 1.0,
            "Steady tone flux should be near zero, got {:.3}",
            result.flux
        );
    }

    #[test]
    fn test_flux_positive_for_onset() {
        let rate = 44100.0;
        let mut samples = vec![0.0f32; 22050];
        samples.extend(tone_mix(&[(1000.0, 0.8)], rate, 0.5));
        let silent_then_tone = stereo(samples, 44100);
        let steady = stereo(tone_mix(&[(1000.0, 0.8)], rate, 1.0), 44100);

        let with_onset = analyze_spectral(&silent_then_tone, Quality::Balanced, &[85.0]).unwrap();
        let without = analyze_spectral(&steady, Quality::Balanced, &[85.0]).unwrap();
        assert!(with_onset.flux > without.flux);
    }

    #[test]
    fn test_harmonic_series_detected() {
        // 220 Hz with decaying harmonics: strongly harmonic
        let harmonics: Vec<(f32, f32)> = (1..=6)
            .map(|h| (220.0 * h as f32, 0.5 / h as f32))
            .collect();
        let buffer = stereo(tone_mix(&harmonics, 44100.0, 1.0), 44100);
        let result = analyze_spectral(&buffer, Quality::Accurate, &[85.0]).unwrap();

        let f0 = result.fundamental_hz.expect("fundamental should be found");
        assert!((f0 - 220.0).abs() < 15.0, "f0 {:.1}, expected ~220", f0);
        assert!(
            result.harmonic_ratio > 0.5,
            "Harmonic series should dominate, ratio {:.2}",
            result.harmonic_ratio
        );
        // Bin quantization of the fundamental bounds the measured
        // deviation; a true harmonic series stays well under 4%
        assert!(result.inharmonicity < 0.04);
    }

    #[test]
    fn test_silence_produces_sentinels() {
        let buffer = stereo(vec![0.0; 44100], 44100);
        let result = analyze_spectral(&buffer, Quality::Balanced, &[85.0, 95.0]).unwrap();
        assert_eq!(result.centroid_hz, 0.0);
        assert_eq!(result.flux, 0.0);
        assert!(result.fundamental_hz.is_none());
        assert_eq!(result.harmonic_ratio, 0.0);
        assert!(result.centroid_hz.is_finite());
        assert!(result.kurtosis.is_finite());
    }

    #[test]
    fn test_tilt_sign_follows_balance() {
        let bassy = stereo(tone_mix(&[(100.0, 0.6)], 44100.0, 1.0), 44100);
        let bright = stereo(tone_mix(&[(15000.0, 0.6)], 44100.0, 1.0), 44100);
        let low = analyze_spectral(&bassy, Quality::Balanced, &[85.0]).unwrap();
        let high = analyze_spectral(&bright, Quality::Balanced, &[85.0]).unwrap();
        assert!(low.tilt_db > 0.0, "Bass-heavy tilt {:.1}", low.tilt_db);
        assert!(high.tilt_db < 0.0, "Treble-heavy tilt {:.1}", high.tilt_db);
    }

    #[test]
    fn test_too_short_buffer_rejected() {
        let buffer = stereo(vec![0.1; 256], 44100);
        assert!(analyze_spectral(&buffer, Quality::Balanced, &[85.0]).is_err());
    }
}
