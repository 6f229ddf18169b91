//! Short-time Fourier transform engine
//!
//! Produces the per-frame magnitude spectrogram and the averaged power
//! spectrum shared by the spectral and key analyzers.

use crate::error::AnalysisError;
use crate::transform::window::WindowKind;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// STFT output
#[derive(Debug, Clone)]
pub struct StftResult {
    /// Magnitude spectrum per frame, each `fft_size / 2` bins (DC..Nyquist)
    pub spectrogram: Vec<Vec<f32>>,
    /// Mean of squared per-frame magnitudes, one value per bin
    pub averaged_power_spectrum: Vec<f32>,
    /// Center frequency of each bin in Hz
    pub freq_bins: Vec<f32>,
}

/// STFT engine with a fixed frame/hop/window configuration
#[derive(Debug, Clone)]
pub struct Stft {
    fft_size: usize,
    hop_size: usize,
    window: WindowKind,
}

impl Stft {
    /// Build an engine
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` when `fft_size` is not a
    /// power of two or `hop_size` is zero.
    pub fn new(fft_size: usize, hop_size: usize, window: WindowKind) -> Result<Self, AnalysisError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(AnalysisError::InvalidInput(format!(
                "STFT frame size must be a power of two, got {}",
                fft_size
            )));
        }
        if hop_size == 0 {
            return Err(AnalysisError::InvalidInput(
                "STFT hop size must be nonzero".to_string(),
            ));
        }
        Ok(Self {
            fft_size,
            hop_size,
            window,
        })
    }

    /// Frame size in samples
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Hop size in samples
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Transform a signal
    ///
    /// Frames are taken at hop-size stride; a tail shorter than one frame
    /// is dropped. Windowing is applied per frame before transforming.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` when the signal is shorter
    /// than one frame.
    pub fn process(&self, signal: &[f32], sample_rate: u32) -> Result<StftResult, AnalysisError> {
        log::debug!(
            "STFT: {} samples at {} Hz, frame={}, hop={}",
            signal.len(),
            sample_rate,
            self.fft_size,
            self.hop_size
        );

        if signal.len() < self.fft_size {
            return Err(AnalysisError::InvalidInput(format!(
                "Signal too short for STFT: {} samples < frame size {}",
                signal.len(),
                self.fft_size
            )));
        }

        let coefficients = self.window.coefficients(self.fft_size);
        let n_bins = self.fft_size / 2;
        let n_frames = (signal.len() - self.fft_size) / self.hop_size + 1;

        let mut planner = FftPlanner::new();
        let transform = planner.plan_fft_forward(self.fft_size);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];

        let mut spectrogram = Vec::with_capacity(n_frames);
        let mut power_sum = vec![0.0f64; n_bins];

        for frame_idx in 0..n_frames {
            let start = frame_idx * self.hop_size;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(signal[start + i] * coefficients[i], 0.0);
            }
            transform.process(&mut buffer);

            let magnitudes: Vec<f32> = buffer[..n_bins].iter().map(|c| c.norm()).collect();
            for (sum, &m) in power_sum.iter_mut().zip(magnitudes.iter()) {
                *sum += (m as f64) * (m as f64);
            }
            spectrogram.push(magnitudes);
        }

        let averaged_power_spectrum: Vec<f32> = power_sum
            .iter()
            .map(|&s| (s / n_frames as f64) as f32)
            .collect();

        let freq_bins: Vec<f32> = (0..n_bins)
            .map(|i| i as f32 * sample_rate as f32 / self.fft_size as f32)
            .collect();

        Ok(StftResult {
            spectrogram,
            averaged_power_spectrum,
            freq_bins,
        })
    }
}
