//! Key detection
//!
//! Correlates the octave-folded chroma vector against the 24 rotated
//! Krumhansl-Schmuckler profiles and scores the winner.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Schmuckler, M. A. — key-finding algorithm as
//! described in Krumhansl (1990), Cognitive Foundations of Musical Pitch.

use super::chroma::{chroma_clarity, extract_chroma};
use super::templates::{rotate, MAJOR_PROFILE, MINOR_PROFILE};
use crate::analysis::result::Key;
use crate::config::Quality;
use crate::error::AnalysisError;
use crate::io::PcmBuffer;
use crate::transform::{Stft, WindowKind};
use serde::{Deserialize, Serialize};

/// Best correlation below this is treated as weak tonality
const WEAK_CORRELATION: f64 = 0.3;

/// Key measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyAnalysis {
    /// Best-matching key
    pub key: Key,

    /// Detection confidence, 0..1
    pub confidence: f64,

    /// Pearson correlation of the winning template
    pub correlation: f64,

    /// Major-vs-minor triad contrast, -1 (minor) .. 1 (major)
    pub modality: f64,

    /// Entropy-based chroma concentration, 0..1
    pub chroma_clarity: f64,

    /// The normalized chroma vector the decision was made on
    pub chroma: Vec<f64>,
}

/// Pearson correlation between a chroma vector and one template
fn pearson(chroma: &[f64; 12], template: &[f64; 12]) -> f64 {
    let mean_x = chroma.iter().sum::<f64>() / 12.0;
    let mean_y = template.iter().sum::<f64>() / 12.0;
    let mut cov = 0.0f64;
    let mut var_x = 0.0f64;
    let mut var_y = 0.0f64;
    for (&x, &y) in chroma.iter().zip(template.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x) * (x - mean_x);
        var_y += (y - mean_y) * (y - mean_y);
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        0.0
    } else {
        cov / (var_x * var_y).sqrt()
    }
}

/// Strongest triad energy of each mode across all 12 roots
fn modality_contrast(chroma: &[f64; 12]) -> f64 {
    let mut best_major = 0.0f64;
    let mut best_minor = 0.0f64;
    for root in 0..12 {
        let major = chroma[root] + chroma[(root + 4) % 12] + chroma[(root + 7) % 12];
        let minor = chroma[root] + chroma[(root + 3) % 12] + chroma[(root + 7) % 12];
        best_major = best_major.max(major);
        best_minor = best_minor.max(minor);
    }
    let total = best_major + best_minor;
    if total <= 0.0 {
        0.0
    } else {
        (best_major - best_minor) / total
    }
}

/// Detect the musical key
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` when the buffer is shorter than
/// one analysis frame, and `AnalysisError::ProcessingError` when the
/// spectrum carries no tonal energy to fold (digital silence).
pub fn analyze_key(buffer: &PcmBuffer, quality: Quality) -> Result<KeyAnalysis, AnalysisError> {
    let mono = buffer.mono_mix();
    let stft = Stft::new(quality.fft_size(), quality.hop_size(), WindowKind::Hann)?;
    let spectrum = stft.process(&mono, buffer.sample_rate())?;

    let chroma = extract_chroma(&spectrum);
    let total: f64 = chroma.iter().sum();
    if total <= 0.0 {
        return Err(AnalysisError::ProcessingError(
            "No tonal energy for key detection".to_string(),
        ));
    }

    log::debug!("Key: chroma extracted from {} frames", spectrum.spectrogram.len());

    // Score all 24 candidates
    let mut scores: Vec<(Key, f64)> = Vec::with_capacity(24);
    for root in 0..12 {
        scores.push((
            Key::Major(root as u32),
            pearson(&chroma, &rotate(&MAJOR_PROFILE, root)),
        ));
        scores.push((
            Key::Minor(root as u32),
            pearson(&chroma, &rotate(&MINOR_PROFILE, root)),
        ));
    }
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (key, best) = scores[0];
    let second = scores[1].1;

    // Confidence: separation from the runner-up, boosted by absolute
    // correlation strength, halved for weak tonality
    let gap = (best - second).max(0.0);
    let mut confidence = (0.5 * (gap * 5.0).min(1.0) + 0.5 * best.max(0.0)).clamp(0.0, 1.0);
    if best < WEAK_CORRELATION {
        confidence *= 0.5;
        log::warn!(
            "Key: weak tonality, best correlation {:.3} for {}",
            best,
            key.name()
        );
    }

    Ok(KeyAnalysis {
        key,
        confidence,
        correlation: best,
        modality: modality_contrast(&chroma),
        chroma_clarity: chroma_clarity(&chroma),
        chroma: chroma.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Equal-power mix of the given pitch classes (octave 4)
    fn pitch_mix(pitch_classes: &[usize], rate: f32, secs: f32) -> PcmBuffer {
        let samples: Vec<f32> = (0..(rate * secs) as usize)
            .map(|i| {
                pitch_classes
                    .iter()
                    .map(|&pc| {
                        let freq = 440.0 * 2.0f32.powf((pc as f32 - 9.0) / 12.0);
                        (2.0 * PI * freq * i as f32 / rate).sin() * 0.2
                    })
                    .sum()
            })
            .collect();
        PcmBuffer::new(samples.clone(), samples, rate as u32).unwrap()
    }

    #[test]
    fn test_c_major_scale_detected() {
        // C D E F G A B
        let buffer = pitch_mix(&[0, 2, 4, 5, 7, 9, 11], 44100.0, 2.0);
        let result = analyze_key(&buffer, Quality::Accurate).unwrap();
        assert_eq!(result.key, Key::Major(0), "Got {}", result.key.name());
        assert!(result.confidence > 0.2);
    }

    #[test]
    fn test_c_major_triad_leans_major() {
        // C E G: the strongest major triad beats any minor triad, which
        // can only pick up two of the three notes
        let buffer = pitch_mix(&[0, 4, 7], 44100.0, 2.0);
        let result = analyze_key(&buffer, Quality::Accurate).unwrap();
        assert!(
            result.modality > 0.0,
            "Major triad should contrast major, got {:.2}",
            result.modality
        );
    }

    #[test]
    fn test_a_minor_triad_leans_minor() {
        // A C E
        let buffer = pitch_mix(&[9, 0, 4], 44100.0, 2.0);
        let result = analyze_key(&buffer, Quality::Accurate).unwrap();
        assert!(
            result.modality < 0.0,
            "Minor triad should contrast minor, got {:.2}",
            result.modality
        );
    }

    #[test]
    fn test_transposition_moves_root() {
        let c = analyze_key(&pitch_mix(&[0, 2, 4, 5, 7, 9, 11], 44100.0, 2.0), Quality::Accurate)
            .unwrap();
        // Up a fifth: G A B C D E F#
        let g = analyze_key(&pitch_mix(&[7, 9, 11, 0, 2, 4, 6], 44100.0, 2.0), Quality::Accurate)
            .unwrap();
        assert_eq!(c.key, Key::Major(0));
        assert_eq!(g.key, Key::Major(7), "Got {}", g.key.name());
    }

    #[test]
    fn test_single_tone_has_low_clarity_penalty() {
        let buffer = pitch_mix(&[9], 44100.0, 2.0);
        let result = analyze_key(&buffer, Quality::Accurate).unwrap();
        // One pitch class: concentrated chroma, high clarity
        assert!(result.chroma_clarity > 0.5);
    }

    #[test]
    fn test_silence_fails_cleanly() {
        let buffer = PcmBuffer::new(vec![0.0; 44100], vec![0.0; 44100], 44100).unwrap();
        let result = analyze_key(&buffer, Quality::Accurate);
        assert!(matches!(result, Err(AnalysisError::ProcessingError(_))));
    }

    #[test]
    fn test_pearson_bounds() {
        let x = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!((pearson(&x, &x) - 1.0).abs() < 1e-9);
        let mut inverted = [1.0f64; 12];
        inverted[0] = 0.0;
        assert!(pearson(&x, &inverted) < 0.0);
    }
}
