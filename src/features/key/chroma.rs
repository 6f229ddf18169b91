//! Octave-folded chroma extraction
//!
//! Folds the averaged power spectrum into 12 pitch classes by summing a
//! triangular window around every octave instance of each pitch-class
//! base frequency.

use crate::transform::StftResult;

/// Reference tuning, Hz
const A4_HZ: f64 = 440.0;
/// Octave range folded into the chroma vector (C1..C7 region)
const OCTAVE_LOW: i32 = -3;
const OCTAVE_HIGH: i32 = 3;

/// Extract a normalized 12-element chroma vector
///
/// Each pitch class accumulates spectral energy under a triangular
/// window spanning one semitone either side of every octave instance of
/// its base frequency. The result is normalized to sum 1; an empty
/// spectrum yields the all-zero vector.
pub fn extract_chroma(spectrum: &StftResult) -> [f64; 12] {
    let mut chroma = [0.0f64; 12];
    if spectrum.freq_bins.len() < 2 {
        return chroma;
    }
    let bin_hz = spectrum.freq_bins[1] as f64;
    let nyquist = *spectrum.freq_bins.last().unwrap() as f64;

    for (pc, slot) in chroma.iter_mut().enumerate() {
        // Pitch-class base frequency in the A4=440 tuning; pc 0 = C
        let base = A4_HZ * 2.0f64.powf((pc as f64 - 9.0) / 12.0);
        for octave in OCTAVE_LOW..=OCTAVE_HIGH {
            let center = base * 2.0f64.powi(octave);
            if center < bin_hz || center > nyquist {
                continue;
            }
            // Triangular window one semitone wide either side
            let lower = center * 2.0f64.powf(-1.0 / 12.0);
            let upper = center * 2.0f64.powf(1.0 / 12.0);
            let bin_lo = (lower / bin_hz).floor() as usize;
            let bin_hi = ((upper / bin_hz).ceil() as usize).min(spectrum.freq_bins.len() - 1);
            for bin in bin_lo..=bin_hi {
                let freq = spectrum.freq_bins[bin] as f64;
                if freq < lower || freq > upper || freq <= 0.0 {
                    continue;
                }
                let distance = (freq - center).abs() / (upper - center).max(center - lower);
                let weight = (1.0 - distance).max(0.0);
                *slot += spectrum.averaged_power_spectrum[bin] as f64 * weight;
            }
        }
    }

    let total: f64 = chroma.iter().sum();
    if total > 0.0 {
        for slot in chroma.iter_mut() {
            *slot /= total;
        }
    }
    chroma
}

/// Shannon-entropy clarity of a normalized chroma vector
///
/// 1.0 for a single concentrated pitch class, 0.0 for a flat
/// distribution (maximum entropy over 12 classes).
pub fn chroma_clarity(chroma: &[f64; 12]) -> f64 {
    let total: f64 = chroma.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut entropy = 0.0f64;
    for &value in chroma {
        let p = value / total;
        if p > 0.0 {
            entropy -= p * p.log2();
        }
    }
    (1.0 - entropy / 12.0f64.log2()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Stft, WindowKind};
    use std::f32::consts::PI;

    fn spectrum_of(samples: &[f32], rate: u32) -> StftResult {
        let stft = Stft::new(4096, 1024, WindowKind::Hann).unwrap();
        stft.process(samples, rate).unwrap()
    }

    fn tone(freq: f32, rate: f32, secs: f32) -> Vec<f32> {
        (0..(rate * secs) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / rate).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_a440_lands_in_pitch_class_a() {
        let spectrum = spectrum_of(&tone(440.0, 44100.0, 1.0), 44100);
        let chroma = extract_chroma(&spectrum);
        // Pitch class 9 = A
        let best = chroma
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9, "chroma: {:?}", chroma);
    }

    #[test]
    fn test_octaves_fold_together() {
        let mut samples = tone(261.63, 44100.0, 1.0); // C4
        for (i, s) in samples.iter_mut().enumerate() {
            *s += (2.0 * PI * 523.25 * i as f32 / 44100.0).sin() * 0.5; // C5
        }
        let spectrum = spectrum_of(&samples, 44100);
        let chroma = extract_chroma(&spectrum);
        assert!(
            chroma[0] > 0.7,
            "Both octaves of C should fold into pitch class 0, got {:?}",
            chroma
        );
    }

    #[test]
    fn test_chroma_normalized() {
        let spectrum = spectrum_of(&tone(440.0, 44100.0, 1.0), 44100);
        let chroma = extract_chroma(&spectrum);
        let sum: f64 = chroma.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_yields_zero_chroma() {
        let spectrum = spectrum_of(&vec![0.0; 44100], 44100);
        let chroma = extract_chroma(&spectrum);
        assert!(chroma.iter().all(|&c| c == 0.0));
        assert_eq!(chroma_clarity(&chroma), 0.0);
    }

    #[test]
    fn test_clarity_extremes() {
        let mut concentrated = [0.0f64; 12];
        concentrated[3] = 1.0;
        assert!((chroma_clarity(&concentrated) - 1.0).abs() < 1e-9);

        let flat = [1.0f64 / 12.0; 12];
        assert!(chroma_clarity(&flat) < 1e-9);
    }
}
