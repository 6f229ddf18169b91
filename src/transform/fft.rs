//! Radix-2 FFT front-end
//!
//! Thin wrapper around `rustfft` with the engine's power-of-two contract:
//! callers pad or truncate before transforming, this module never resizes
//! silently.

use crate::error::AnalysisError;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Full complex spectrum of one frame
#[derive(Debug, Clone)]
pub struct FftResult {
    /// Real part per bin
    pub real: Vec<f32>,
    /// Imaginary part per bin
    pub imag: Vec<f32>,
    /// Magnitude per bin
    pub magnitude: Vec<f32>,
    /// Phase per bin, radians
    pub phase: Vec<f32>,
}

/// Forward FFT of a power-of-two-length signal
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` when the signal is empty or its
/// length is not a power of two.
pub fn fft(signal: &[f32]) -> Result<FftResult, AnalysisError> {
    if signal.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "Empty FFT input".to_string(),
        ));
    }
    if !signal.len().is_power_of_two() {
        return Err(AnalysisError::InvalidInput(format!(
            "FFT length must be a power of two, got {}",
            signal.len()
        )));
    }

    let mut buffer: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();

    let mut planner = FftPlanner::new();
    let transform = planner.plan_fft_forward(buffer.len());
    transform.process(&mut buffer);

    let mut real = Vec::with_capacity(buffer.len());
    let mut imag = Vec::with_capacity(buffer.len());
    let mut magnitude = Vec::with_capacity(buffer.len());
    let mut phase = Vec::with_capacity(buffer.len());
    for c in &buffer {
        real.push(c.re);
        imag.push(c.im);
        magnitude.push(c.norm());
        phase.push(c.im.atan2(c.re));
    }

    Ok(FftResult {
        real,
        imag,
        magnitude,
        phase,
    })
}
