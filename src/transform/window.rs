//! Analysis window functions

use std::f32::consts::PI;

/// Window function applied to each frame before transforming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Hann window (default for all analyzers)
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window
    Blackman,
}

impl WindowKind {
    /// Window coefficients for a frame of `len` samples
    ///
    /// Uses the periodic form `2*pi*n/N` so that overlapping frames at
    /// 50% and 75% hop sum flat.
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len == 0 {
            return vec![];
        }
        let n = len as f32;
        (0..len)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n;
                match self {
                    WindowKind::Hann => 0.5 * (1.0 - x.cos()),
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_endpoints() {
        let w = WindowKind::Hann.coefficients(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-6, "Hann should start at zero");
        // Periodic Hann peaks at len/2
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hamming_floor() {
        let w = WindowKind::Hamming.coefficients(16);
        // Hamming does not reach zero
        assert!(w.iter().all(|&x| x > 0.05));
    }

    #[test]
    fn test_blackman_peak() {
        let w = WindowKind::Blackman.coefficients(16);
        let max = w.iter().copied().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_window() {
        assert!(WindowKind::Hann.coefficients(0).is_empty());
    }
}
