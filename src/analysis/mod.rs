//! Orchestration and result assembly

pub mod diagnostics;
pub mod orchestrator;
pub mod result;

pub use result::{AnalysisResult, FeatureResult};
