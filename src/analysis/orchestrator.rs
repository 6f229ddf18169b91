//! Analyzer orchestration
//!
//! Runs the enabled analyzers against one immutable PCM snapshot as a
//! set of independent tasks joined at a barrier, wraps every outcome in
//! a [`FeatureResult`], and merges the survivors into the canonical
//! schema. One analyzer failing, panicking or overrunning its budget
//! never aborts its siblings.

use crate::analysis::diagnostics::derive_diagnostics;
use crate::analysis::result::{AnalysisMetadata, AnalysisResult, FeatureResult};
use crate::config::AnalysisOptions;
use crate::error::AnalysisError;
use crate::features::dynamics::{analyze_dynamics, DynamicsAnalysis};
use crate::features::key::{analyze_key, KeyAnalysis};
use crate::features::loudness::{analyze_loudness, LoudnessAnalysis};
use crate::features::rhythm::{analyze_rhythm, RhythmAnalysis};
use crate::features::spectral::{analyze_spectral, SpectralAnalysis};
use crate::features::stereo::{analyze_stereo, StereoAnalysis};
use crate::features::tonal_balance::{analyze_tonal_balance, TonalBalanceAnalysis};
use crate::features::true_peak::{analyze_true_peak, TruePeakAnalysis};
use crate::io::PcmBuffer;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// The closed set of analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalyzerKind {
    Loudness,
    TruePeak,
    Dynamics,
    Spectral,
    Stereo,
    TonalBalance,
    Rhythm,
    Key,
}

impl AnalyzerKind {
    fn name(self) -> &'static str {
        match self {
            AnalyzerKind::Loudness => "loudness",
            AnalyzerKind::TruePeak => "true_peak",
            AnalyzerKind::Dynamics => "dynamics",
            AnalyzerKind::Spectral => "spectral",
            AnalyzerKind::Stereo => "stereo",
            AnalyzerKind::TonalBalance => "tonal_balance",
            AnalyzerKind::Rhythm => "rhythm",
            AnalyzerKind::Key => "key",
        }
    }
}

/// One analyzer's merged payload
///
/// A closed tagged union so the merge below is a compile-checked match:
/// adding an analyzer without wiring its slot does not build.
enum AnalyzerOutput {
    Loudness(FeatureResult<LoudnessAnalysis>),
    TruePeak(FeatureResult<TruePeakAnalysis>),
    Dynamics(FeatureResult<DynamicsAnalysis>),
    Spectral(FeatureResult<SpectralAnalysis>),
    Stereo(FeatureResult<StereoAnalysis>),
    TonalBalance(FeatureResult<TonalBalanceAnalysis>),
    Rhythm(FeatureResult<RhythmAnalysis>),
    Key(FeatureResult<KeyAnalysis>),
}

/// Run one analyzer under failure isolation and a wall-clock budget
///
/// Panics become `Failed` like any other error. The budget check is
/// cooperative: a completed-but-late result is discarded at the join,
/// in-flight computation is never interrupted.
fn guard<T>(
    kind: AnalyzerKind,
    budget: Duration,
    run: impl FnOnce() -> Result<T, AnalysisError>,
) -> FeatureResult<T> {
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(run));
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(value)) => {
            if elapsed > budget {
                log::warn!(
                    "{} exceeded its {} ms budget ({} ms)",
                    kind.name(),
                    budget.as_millis(),
                    elapsed.as_millis()
                );
                FeatureResult::Failed(AnalysisError::Timeout(format!(
                    "{} exceeded its {} ms budget",
                    kind.name(),
                    budget.as_millis()
                ))
                .to_string())
            } else {
                FeatureResult::Success(value)
            }
        }
        Ok(Err(error)) => {
            log::warn!("{} failed: {}", kind.name(), error);
            FeatureResult::Failed(error.to_string())
        }
        Err(_) => {
            log::warn!("{} panicked", kind.name());
            FeatureResult::Failed(format!("{} panicked during analysis", kind.name()))
        }
    }
}

fn run_analyzer(
    kind: AnalyzerKind,
    buffer: &PcmBuffer,
    options: &AnalysisOptions,
) -> AnalyzerOutput {
    let budget = Duration::from_millis(options.feature_timeout_ms());
    match kind {
        AnalyzerKind::Loudness => AnalyzerOutput::Loudness(guard(kind, budget, || {
            analyze_loudness(buffer, options.reference_loudness_lufs)
        })),
        AnalyzerKind::TruePeak => {
            AnalyzerOutput::TruePeak(guard(kind, budget, || analyze_true_peak(buffer)))
        }
        AnalyzerKind::Dynamics => {
            AnalyzerOutput::Dynamics(guard(kind, budget, || analyze_dynamics(buffer)))
        }
        AnalyzerKind::Spectral => AnalyzerOutput::Spectral(guard(kind, budget, || {
            analyze_spectral(buffer, options.quality, &options.rolloff_percentiles)
        })),
        AnalyzerKind::Stereo => {
            AnalyzerOutput::Stereo(guard(kind, budget, || analyze_stereo(buffer)))
        }
        AnalyzerKind::TonalBalance => {
            AnalyzerOutput::TonalBalance(guard(kind, budget, || analyze_tonal_balance(buffer)))
        }
        AnalyzerKind::Rhythm => AnalyzerOutput::Rhythm(guard(kind, budget, || {
            analyze_rhythm(buffer, options.min_bpm, options.max_bpm)
        })),
        AnalyzerKind::Key => {
            AnalyzerOutput::Key(guard(kind, budget, || analyze_key(buffer, options.quality)))
        }
    }
}

/// Run the full pipeline
///
/// Always returns a structurally complete [`AnalysisResult`]; the only
/// errors surfaced here are the fatal input invariants already enforced
/// by [`PcmBuffer`] construction.
pub fn run(buffer: &PcmBuffer, options: &AnalysisOptions) -> Result<AnalysisResult, AnalysisError> {
    let started = Instant::now();

    let enabled: Vec<AnalyzerKind> = [
        (options.features.loudness, AnalyzerKind::Loudness),
        (options.features.true_peak, AnalyzerKind::TruePeak),
        (options.features.dynamics, AnalyzerKind::Dynamics),
        (options.features.spectral, AnalyzerKind::Spectral),
        (options.features.stereo, AnalyzerKind::Stereo),
        (options.features.tonal_balance, AnalyzerKind::TonalBalance),
        (options.features.rhythm, AnalyzerKind::Rhythm),
        (options.features.key, AnalyzerKind::Key),
    ]
    .into_iter()
    .filter_map(|(on, kind)| on.then_some(kind))
    .collect();

    log::debug!(
        "Orchestrator: {} analyzers over {} samples at {} Hz",
        enabled.len(),
        buffer.len(),
        buffer.sample_rate()
    );

    // Join-all over independent pure tasks; the snapshot is shared
    // read-only and each analyzer allocates privately
    let outputs: Vec<AnalyzerOutput> = enabled
        .par_iter()
        .map(|&kind| run_analyzer(kind, buffer, options))
        .collect();

    let mut result = AnalysisResult {
        loudness: None,
        true_peak: None,
        dynamics: None,
        spectral: None,
        stereo: None,
        tonal_balance: None,
        rhythm: None,
        key: None,
        warnings: vec![],
        problems: vec![],
        suggestions: vec![],
        mix_health: 100.0,
        metadata: AnalysisMetadata {
            duration_seconds: buffer.duration_seconds(),
            sample_rate: buffer.sample_rate(),
            processing_time_ms: 0.0,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            analyzers_run: enabled.iter().map(|k| k.name().to_string()).collect(),
        },
    };

    let mut warnings: Vec<String> = Vec::new();
    for output in outputs {
        match output {
            AnalyzerOutput::Loudness(feature) => {
                note_failure("loudness", &feature, &mut warnings);
                result.loudness = Some(feature);
            }
            AnalyzerOutput::TruePeak(feature) => {
                note_failure("true_peak", &feature, &mut warnings);
                result.true_peak = Some(feature);
            }
            AnalyzerOutput::Dynamics(feature) => {
                note_failure("dynamics", &feature, &mut warnings);
                result.dynamics = Some(feature);
            }
            AnalyzerOutput::Spectral(feature) => {
                note_failure("spectral", &feature, &mut warnings);
                result.spectral = Some(feature);
            }
            AnalyzerOutput::Stereo(feature) => {
                note_failure("stereo", &feature, &mut warnings);
                result.stereo = Some(feature);
            }
            AnalyzerOutput::TonalBalance(feature) => {
                note_failure("tonal_balance", &feature, &mut warnings);
                result.tonal_balance = Some(feature);
            }
            AnalyzerOutput::Rhythm(feature) => {
                note_failure("rhythm", &feature, &mut warnings);
                result.rhythm = Some(feature);
            }
            AnalyzerOutput::Key(feature) => {
                note_failure("key", &feature, &mut warnings);
                result.key = Some(feature);
            }
        }
    }
    result.warnings = warnings;

    let (mix_health, problems, suggestions) =
        derive_diagnostics(&result, options.reference_loudness_lufs);
    result.mix_health = mix_health;
    result.problems = problems;
    result.suggestions = suggestions;

    result.metadata.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

    Ok(result)
}

fn note_failure<T>(name: &str, feature: &FeatureResult<T>, warnings: &mut Vec<String>) {
    if let Some(reason) = feature.failure_reason() {
        warnings.push(format!("{} analyzer failed: {}", name, reason));
    }
}
