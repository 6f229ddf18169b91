//! Shared biquad filter kernel
//!
//! Second-order IIR sections designed by bilinear transform, used by the
//! loudness meter (K-weighting), the tonal balance and per-band stereo
//! analyzers (band-limiting cascades) and the rhythm analyzer (onset
//! high-pass).

use std::f64::consts::PI;

/// Direct-form I biquad section
///
/// Coefficients are stored normalized (a0 = 1). State is per-instance;
/// clone a designed filter to process independent channels.
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Second-order high-pass at `f0` Hz with quality `q`
    pub fn high_pass(sample_rate: f64, f0: f64, q: f64) -> Self {
        let k = (PI * f0 / sample_rate).tan();
        let norm = 1.0 / (1.0 + k / q + k * k);
        Self {
            b0: norm,
            b1: -2.0 * norm,
            b2: norm,
            a1: 2.0 * (k * k - 1.0) * norm,
            a2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Second-order low-pass at `f0` Hz with quality `q`
    pub fn low_pass(sample_rate: f64, f0: f64, q: f64) -> Self {
        let k = (PI * f0 / sample_rate).tan();
        let norm = 1.0 / (1.0 + k / q + k * k);
        Self {
            b0: k * k * norm,
            b1: 2.0 * k * k * norm,
            b2: k * k * norm,
            a1: 2.0 * (k * k - 1.0) * norm,
            a2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// High-shelf at `f0` Hz boosting by `gain_db` with quality `q`
    ///
    /// This is the shape of the BS.1770 pre-filter; the loudness meter
    /// instantiates it with the reference constants.
    pub fn high_shelf(sample_rate: f64, f0: f64, gain_db: f64, q: f64) -> Self {
        let k = (PI * f0 / sample_rate).tan();
        let v0 = 10.0f64.powf(gain_db / 20.0);
        let root = v0.sqrt();
        let a0 = 1.0 + k / q + k * k;
        let norm = 1.0 / a0;
        Self {
            b0: (v0 + root * k / q + k * k) * norm,
            b1: 2.0 * (k * k - v0) * norm,
            b2: (v0 - root * k / q + k * k) * norm,
            a1: 2.0 * (k * k - 1.0) * norm,
            a2: (1.0 - k / q + k * k) * norm,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process one sample
    #[inline(always)]
    pub fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Reset the delay state
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Run a signal through a chain of sections, returning the filtered copy
pub fn filter_chain(signal: &[f32], sections: &mut [Biquad]) -> Vec<f32> {
    signal
        .iter()
        .map(|&x| {
            let mut acc = x as f64;
            for section in sections.iter_mut() {
                acc = section.process(acc);
            }
            acc as f32
        })
        .collect()
}

const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Band-limit a signal to [low_hz, high_hz]
///
/// Two cascaded second-order sections per edge (~24 dB/oct). An edge at
/// or beyond Nyquist is skipped rather than folded. Band edges leak by
/// up to ~1 dB near the corners; callers that compare adjacent bands
/// tolerate this.
pub fn band_limit(signal: &[f32], sample_rate: u32, low_hz: f64, high_hz: f64) -> Vec<f32> {
    let fs = sample_rate as f64;
    let nyquist = fs / 2.0;

    let mut sections: Vec<Biquad> = Vec::with_capacity(4);
    if low_hz > 0.0 && low_hz < nyquist {
        sections.push(Biquad::high_pass(fs, low_hz, BUTTERWORTH_Q));
        sections.push(Biquad::high_pass(fs, low_hz, BUTTERWORTH_Q));
    }
    if high_hz < nyquist {
        sections.push(Biquad::low_pass(fs, high_hz, BUTTERWORTH_Q));
        sections.push(Biquad::low_pass(fs, high_hz, BUTTERWORTH_Q));
    }

    if sections.is_empty() {
        return signal.to_vec();
    }
    filter_chain(signal, &mut sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI as PI32;

    fn sine(freq: f32, rate: f32, secs: f32) -> Vec<f32> {
        (0..(rate * secs) as usize)
            .map(|i| (2.0 * PI32 * freq * i as f32 / rate).sin())
            .collect()
    }

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|&x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
    }

    #[test]
    fn test_high_pass_attenuates_low_frequency() {
        let signal = sine(30.0, 48000.0, 1.0);
        let mut hp = [Biquad::high_pass(48000.0, 500.0, BUTTERWORTH_Q)];
        let filtered = filter_chain(&signal, &mut hp);
        assert!(
            rms(&filtered) < rms(&signal) * 0.1,
            "30 Hz should be heavily attenuated by a 500 Hz high-pass"
        );
    }

    #[test]
    fn test_high_pass_passes_high_frequency() {
        let signal = sine(5000.0, 48000.0, 1.0);
        let mut hp = [Biquad::high_pass(48000.0, 500.0, BUTTERWORTH_Q)];
        let filtered = filter_chain(&signal, &mut hp);
        assert!(rms(&filtered) > rms(&signal) * 0.9);
    }

    #[test]
    fn test_low_pass_attenuates_high_frequency() {
        let signal = sine(10000.0, 48000.0, 1.0);
        let mut lp = [Biquad::low_pass(48000.0, 1000.0, BUTTERWORTH_Q)];
        let filtered = filter_chain(&signal, &mut lp);
        assert!(rms(&filtered) < rms(&signal) * 0.1);
    }

    #[test]
    fn test_high_shelf_boosts_treble() {
        let treble = sine(10000.0, 48000.0, 1.0);
        let bass = sine(100.0, 48000.0, 1.0);
        let mut shelf_t = [Biquad::high_shelf(48000.0, 1681.97, 4.0, 0.7071)];
        let mut shelf_b = [Biquad::high_shelf(48000.0, 1681.97, 4.0, 0.7071)];
        let boosted_treble = filter_chain(&treble, &mut shelf_t);
        let passed_bass = filter_chain(&bass, &mut shelf_b);
        // ~+4 dB above the shelf, ~unity below it
        let treble_gain_db = 20.0 * (rms(&boosted_treble) / rms(&treble)).log10();
        let bass_gain_db = 20.0 * (rms(&passed_bass) / rms(&bass)).log10();
        assert!(
            (treble_gain_db - 4.0).abs() < 0.5,
            "Treble gain {:.2} dB, expected ~4",
            treble_gain_db
        );
        assert!(bass_gain_db.abs() < 0.5);
    }

    #[test]
    fn test_band_limit_isolates_band() {
        let rate = 48000.0;
        let in_band = sine(1000.0, rate, 1.0);
        let below = sine(60.0, rate, 1.0);
        let above = sine(12000.0, rate, 1.0);

        let kept = band_limit(&in_band, 48000, 250.0, 4000.0);
        let cut_low = band_limit(&below, 48000, 250.0, 4000.0);
        let cut_high = band_limit(&above, 48000, 250.0, 4000.0);

        assert!(rms(&kept) > rms(&in_band) * 0.8);
        assert!(rms(&cut_low) < rms(&below) * 0.1);
        assert!(rms(&cut_high) < rms(&above) * 0.1);
    }

    #[test]
    fn test_band_limit_skips_nyquist_edge() {
        // 20 kHz upper edge at 32 kHz rate sits above Nyquist; only the
        // high-pass half should apply.
        let signal = sine(5000.0, 32000.0, 0.5);
        let filtered = band_limit(&signal, 32000, 4000.0, 20000.0);
        assert!(rms(&filtered) > rms(&signal) * 0.7);
    }
}
