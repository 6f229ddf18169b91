//! Tonal balance across four fixed bands
//!
//! Band-limits the mono mix (cascaded biquad high-pass + low-pass per
//! band) and measures RMS/peak level and energy share, then maps
//! adjacent-band ratios onto categorical descriptors.

use crate::error::AnalysisError;
use crate::features::filters::band_limit;
use crate::io::PcmBuffer;
use serde::{Deserialize, Serialize};

/// Band edges in Hz: sub, low, mid, high
const BANDS: [(&str, f64, f64); 4] = [
    ("sub", 20.0, 60.0),
    ("low", 60.0, 250.0),
    ("mid", 250.0, 4000.0),
    ("high", 4000.0, 20000.0),
];

/// Low band louder than mid by more than this reads as muddy, dB
const MUDDY_MARGIN_DB: f64 = 3.0;
/// High band RMS above this absolute level reads as harsh, dB
const HARSH_LEVEL_DB: f64 = -10.0;
/// Low band trailing mid by more than this reads as thin, dB
const THIN_MARGIN_DB: f64 = 6.0;
/// Sub band louder than low by more than this reads as boomy, dB
const BOOMY_MARGIN_DB: f64 = 2.0;

/// Overall character derived from band ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDescriptor {
    /// Low band dominates the mids
    Muddy,
    /// High band runs hot in absolute terms
    Harsh,
    /// Low band is underrepresented
    Thin,
    /// Sub band dominates the low band
    Boomy,
    /// Nothing stands out
    Balanced,
}

/// One band's measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandLevel {
    /// Band label (sub/low/mid/high)
    pub band: String,
    /// Lower band edge, Hz
    pub low_hz: f64,
    /// Upper band edge, Hz
    pub high_hz: f64,
    /// Band RMS level in dB. Negative infinity for an empty band.
    pub rms_db: f64,
    /// Band peak level in dB. Negative infinity for an empty band.
    pub peak_db: f64,
    /// Share of total band energy, 0..1
    pub energy_share: f64,
}

/// Tonal balance measurements for one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TonalBalanceAnalysis {
    /// Per-band levels, ordered sub/low/mid/high
    pub bands: Vec<BandLevel>,
    /// Categorical descriptors, dominant condition first; `[Balanced]`
    /// when no threshold trips
    pub descriptors: Vec<BalanceDescriptor>,
}

#[inline]
fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Measure tonal balance
pub fn analyze_tonal_balance(buffer: &PcmBuffer) -> Result<TonalBalanceAnalysis, AnalysisError> {
    log::debug!(
        "Tonal balance: {} samples at {} Hz",
        buffer.len(),
        buffer.sample_rate()
    );

    let mono = buffer.mono_mix();
    let n = mono.len() as f64;

    let mut bands = Vec::with_capacity(BANDS.len());
    let mut energies = Vec::with_capacity(BANDS.len());
    for &(name, low_hz, high_hz) in &BANDS {
        let filtered = band_limit(&mono, buffer.sample_rate(), low_hz, high_hz);
        let energy: f64 = filtered.iter().map(|&x| (x as f64) * (x as f64)).sum();
        let rms = (energy / n).sqrt();
        let peak = filtered
            .iter()
            .map(|&x| (x as f64).abs())
            .fold(0.0f64, f64::max);
        energies.push(energy);
        bands.push(BandLevel {
            band: name.to_string(),
            low_hz,
            high_hz,
            rms_db: linear_to_db(rms),
            peak_db: linear_to_db(peak),
            energy_share: 0.0,
        });
    }

    let total_energy: f64 = energies.iter().sum();
    if total_energy > 0.0 {
        for (band, &energy) in bands.iter_mut().zip(energies.iter()) {
            band.energy_share = energy / total_energy;
        }
    }

    let descriptors = describe(&bands);

    Ok(TonalBalanceAnalysis { bands, descriptors })
}

fn describe(bands: &[BandLevel]) -> Vec<BalanceDescriptor> {
    let sub = bands[0].rms_db;
    let low = bands[1].rms_db;
    let mid = bands[2].rms_db;
    let high = bands[3].rms_db;

    let mut descriptors = Vec::new();
    if low.is_finite() && mid.is_finite() && low - mid > MUDDY_MARGIN_DB {
        descriptors.push(BalanceDescriptor::Muddy);
    }
    if high.is_finite() && high > HARSH_LEVEL_DB {
        descriptors.push(BalanceDescriptor::Harsh);
    }
    if low.is_finite() && mid.is_finite() && mid - low > THIN_MARGIN_DB {
        descriptors.push(BalanceDescriptor::Thin);
    }
    if sub.is_finite() && low.is_finite() && sub - low > BOOMY_MARGIN_DB {
        descriptors.push(BalanceDescriptor::Boomy);
    }
    if descriptors.is_empty() {
        descriptors.push(BalanceDescriptor::Balanced);
    }
    descriptors
}
