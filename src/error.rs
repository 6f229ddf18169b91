//! Error types for the audio metrics engine

use std::fmt;

/// Errors that can occur during analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Invalid input parameters (mismatched channels, empty buffer, bad rate)
    InvalidInput(String),

    /// Processing error during analysis
    ProcessingError(String),

    /// Numerical error (degenerate spectrum, non-finite intermediate, etc.)
    NumericalError(String),

    /// Analyzer exceeded its wall-clock budget
    Timeout(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            AnalysisError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            AnalysisError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}
