//! Analysis result types
//!
//! The canonical output tree: one `FeatureResult`-wrapped sub-record per
//! analyzer plus derived diagnostics. Level fields keep mathematical
//! negative infinity internally; serialization to JSON renders every
//! non-finite float as `null`, so nothing NaN-like crosses the boundary.

use crate::features::dynamics::DynamicsAnalysis;
use crate::features::key::KeyAnalysis;
use crate::features::loudness::LoudnessAnalysis;
use crate::features::rhythm::RhythmAnalysis;
use crate::features::spectral::SpectralAnalysis;
use crate::features::stereo::StereoAnalysis;
use crate::features::tonal_balance::TonalBalanceAnalysis;
use crate::features::true_peak::TruePeakAnalysis;
use serde::{Deserialize, Serialize};

/// Musical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Major key (0 = C, 1 = C#, ..., 11 = B)
    Major(u32),
    /// Minor key (0 = C, 1 = C#, ..., 11 = B)
    Minor(u32),
}

impl Key {
    /// Key name in musical notation
    ///
    /// # Example
    ///
    /// ```
    /// use mixprobe_dsp::analysis::result::Key;
    ///
    /// assert_eq!(Key::Major(0).name(), "C");
    /// assert_eq!(Key::Major(6).name(), "F#");
    /// assert_eq!(Key::Minor(9).name(), "Am");
    /// ```
    pub fn name(&self) -> String {
        let note_names = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        match self {
            Key::Major(i) => note_names[*i as usize % 12].to_string(),
            Key::Minor(i) => format!("{}m", note_names[*i as usize % 12]),
        }
    }
}

/// Tagged outcome of one analyzer
///
/// The orchestrator converts analyzer errors, panics and timeouts into
/// `Failed`; one failed feature never aborts the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum FeatureResult<T> {
    /// Analyzer completed
    Success(T),
    /// Analyzer failed or timed out; the reason is human-readable
    Failed(String),
}

impl<T> FeatureResult<T> {
    /// Successful payload, if any
    pub fn as_success(&self) -> Option<&T> {
        match self {
            FeatureResult::Success(value) => Some(value),
            FeatureResult::Failed(_) => None,
        }
    }

    /// True for the `Failed` variant
    pub fn is_failed(&self) -> bool {
        matches!(self, FeatureResult::Failed(_))
    }

    /// Failure reason, if any
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            FeatureResult::Success(_) => None,
            FeatureResult::Failed(reason) => Some(reason),
        }
    }
}

/// Problem classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Hard clipping in the sample data
    Clipping,
    /// Inter-sample peaks above the broadcast ceiling
    TruePeakOvershoot,
    /// Negative or collapsed channel correlation
    PhaseIssue,
    /// Dynamic range crushed below useful levels
    LowDynamicRange,
    /// DC bias in one or both channels
    DcOffset,
    /// Left/right level imbalance
    ChannelImbalance,
}

/// Problem severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth knowing about
    Info,
    /// Audible or standards-relevant
    Warning,
    /// Actively damaging the material
    Severe,
}

/// A detected problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Classification
    pub kind: ProblemKind,
    /// How bad it is
    pub severity: Severity,
    /// Human-readable description with the measured values
    pub message: String,
}

/// Suggestion category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    /// Loudness targets and headroom
    Loudness,
    /// Compression and dynamics
    Dynamics,
    /// Stereo image and phase
    StereoImage,
    /// Frequency balance
    TonalBalance,
}

/// An actionable suggestion derived from the measurements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Category the suggestion belongs to
    pub category: SuggestionCategory,
    /// Human-readable recommendation
    pub message: String,
}

/// Run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Buffer duration in seconds
    pub duration_seconds: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: f64,

    /// Engine version
    pub engine_version: String,

    /// Analyzers that were enabled for this run
    pub analyzers_run: Vec<String>,
}

/// Complete analysis result
///
/// Structurally complete for every call that passes input validation:
/// disabled analyzers are `None`, failed analyzers are
/// `Some(FeatureResult::Failed)`, and the diagnostics are derived from
/// whatever succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Loudness measurements
    pub loudness: Option<FeatureResult<LoudnessAnalysis>>,

    /// True-peak measurements
    pub true_peak: Option<FeatureResult<TruePeakAnalysis>>,

    /// Level and dynamics measurements
    pub dynamics: Option<FeatureResult<DynamicsAnalysis>>,

    /// Spectral measurements
    pub spectral: Option<FeatureResult<SpectralAnalysis>>,

    /// Stereo image measurements
    pub stereo: Option<FeatureResult<StereoAnalysis>>,

    /// Tonal balance measurements
    pub tonal_balance: Option<FeatureResult<TonalBalanceAnalysis>>,

    /// Rhythm measurements
    pub rhythm: Option<FeatureResult<RhythmAnalysis>>,

    /// Key measurements
    pub key: Option<FeatureResult<KeyAnalysis>>,

    /// Warnings accumulated during the run (failed analyzers, timeouts,
    /// degenerate inputs)
    pub warnings: Vec<String>,

    /// Detected problems, worst first, capped
    pub problems: Vec<Problem>,

    /// Suggestions derived from the measurements, capped
    pub suggestions: Vec<Suggestion>,

    /// Composite health score, 0..100
    pub mix_health: f32,

    /// Run metadata
    pub metadata: AnalysisMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_major() {
        assert_eq!(Key::Major(0).name(), "C");
        assert_eq!(Key::Major(6).name(), "F#");
        assert_eq!(Key::Major(11).name(), "B");
    }

    #[test]
    fn test_key_name_minor() {
        assert_eq!(Key::Minor(0).name(), "Cm");
        assert_eq!(Key::Minor(9).name(), "Am");
    }

    #[test]
    fn test_feature_result_accessors() {
        let ok: FeatureResult<u32> = FeatureResult::Success(7);
        assert_eq!(ok.as_success(), Some(&7));
        assert!(!ok.is_failed());
        assert_eq!(ok.failure_reason(), None);

        let failed: FeatureResult<u32> = FeatureResult::Failed("boom".to_string());
        assert_eq!(failed.as_success(), None);
        assert!(failed.is_failed());
        assert_eq!(failed.failure_reason(), Some("boom"));
    }

    #[test]
    fn test_feature_result_serialization_shape() {
        let ok: FeatureResult<u32> = FeatureResult::Success(7);
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], 7);

        let failed: FeatureResult<u32> = FeatureResult::Failed("no signal".to_string());
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["data"], "no signal");
    }

    #[test]
    fn test_non_finite_levels_serialize_as_null() {
        #[derive(Serialize)]
        struct Levels {
            rms_db: f64,
        }
        let json = serde_json::to_value(&Levels {
            rms_db: f64::NEG_INFINITY,
        })
        .unwrap();
        assert!(json["rms_db"].is_null());
    }
}
