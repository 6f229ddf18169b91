//! Transform kernel
//!
//! Radix-2 FFT front-end, analysis windows, and the STFT engine every
//! spectrum-based analyzer is built on.

pub mod fft;
pub mod stft;
pub mod window;

pub use fft::{fft, FftResult};
pub use stft::{Stft, StftResult};
pub use window::WindowKind;
