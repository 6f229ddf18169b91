//! Derived diagnostics
//!
//! Threshold rules over the merged measurements: the composite
//! mix-health score, the problem list and the suggestion list. Failed
//! or disabled analyzers simply contribute nothing.

use crate::analysis::result::{
    AnalysisResult, Problem, ProblemKind, Severity, Suggestion, SuggestionCategory,
};
use crate::features::tonal_balance::BalanceDescriptor;

/// Most problems reported
const MAX_PROBLEMS: usize = 8;
/// Most suggestions reported
const MAX_SUGGESTIONS: usize = 10;

/// Clipping ratio (fraction of samples) treated as a problem
const CLIPPING_PROBLEM_RATIO: f64 = 0.0005;
/// Dynamic range below this reads as crushed, dB
const LOW_DR_DB: f64 = 6.0;
/// Correlation below this costs health points
const CORRELATION_FLOOR: f64 = 0.2;
/// Channel imbalance worth flagging, dB
const IMBALANCE_DB: f64 = 3.0;
/// Loudness band around the reference treated as on target, LU
const LOUDNESS_BAND_BELOW: f64 = 4.0;
const LOUDNESS_BAND_ABOVE: f64 = 2.0;
/// Loudness range below this reads as over-compressed, LU
const NARROW_LRA_LU: f64 = 3.0;

/// Compute the health score and the diagnostics lists
///
/// The score starts at 100 and subtracts weighted penalties for
/// clipping, collapsed correlation, crushed dynamics, DC offset and
/// true-peak overshoot, floored at 0.
pub fn derive_diagnostics(
    result: &AnalysisResult,
    reference_lufs: f64,
) -> (f32, Vec<Problem>, Vec<Suggestion>) {
    let mut health = 100.0f64;
    let mut problems: Vec<Problem> = Vec::new();
    let mut suggestions: Vec<Suggestion> = Vec::new();

    let dynamics = result.dynamics.as_ref().and_then(|f| f.as_success());
    let loudness = result.loudness.as_ref().and_then(|f| f.as_success());
    let true_peak = result.true_peak.as_ref().and_then(|f| f.as_success());
    let stereo = result.stereo.as_ref().and_then(|f| f.as_success());
    let tonal = result.tonal_balance.as_ref().and_then(|f| f.as_success());

    if let Some(dynamics) = dynamics {
        let clip_pct = dynamics.clipped_sample_ratio * 100.0;
        health -= (clip_pct * 6.0).min(30.0);
        if dynamics.clipped_sample_ratio > CLIPPING_PROBLEM_RATIO {
            problems.push(Problem {
                kind: ProblemKind::Clipping,
                severity: if clip_pct > 1.0 {
                    Severity::Severe
                } else {
                    Severity::Warning
                },
                message: format!(
                    "Clipping on {:.3}% of samples ({} events)",
                    clip_pct, dynamics.clipping_events
                ),
            });
        }

        if dynamics.dynamic_range_db.is_finite() && dynamics.rms_db.is_finite() {
            if dynamics.dynamic_range_db < LOW_DR_DB {
                health -= ((LOW_DR_DB - dynamics.dynamic_range_db) / LOW_DR_DB * 25.0)
                    .clamp(0.0, 25.0);
                problems.push(Problem {
                    kind: ProblemKind::LowDynamicRange,
                    severity: Severity::Warning,
                    message: format!(
                        "Dynamic range of {:.1} dB leaves little level movement",
                        dynamics.dynamic_range_db
                    ),
                });
            }
            if dynamics.crest_factor_db < 6.0 {
                suggestions.push(Suggestion {
                    category: SuggestionCategory::Dynamics,
                    message: format!(
                        "Crest factor is {:.1} dB; ease compression or limiting to restore transients",
                        dynamics.crest_factor_db
                    ),
                });
            }
        }

        let dc = dynamics.dc_offset[0].abs().max(dynamics.dc_offset[1].abs());
        if dynamics.dc_offset_flagged {
            health -= ((dc - 0.01) / 0.04 * 10.0).clamp(0.0, 10.0);
            problems.push(Problem {
                kind: ProblemKind::DcOffset,
                severity: Severity::Warning,
                message: format!("DC offset of {:.1}% of full scale; apply a DC high-pass", dc * 100.0),
            });
        }
    }

    if let Some(true_peak) = true_peak {
        if true_peak.true_peak_dbtp.is_finite() && true_peak.true_peak_dbtp > -1.0 {
            health -= ((true_peak.true_peak_dbtp + 1.0) / 2.0 * 15.0).clamp(0.0, 15.0);
            problems.push(Problem {
                kind: ProblemKind::TruePeakOvershoot,
                severity: if true_peak.true_peak_dbtp > 0.0 {
                    Severity::Severe
                } else {
                    Severity::Warning
                },
                message: format!(
                    "True peak {:.2} dBTP exceeds the -1 dBTP broadcast ceiling",
                    true_peak.true_peak_dbtp
                ),
            });
        }
    }

    if let Some(stereo) = stereo {
        if stereo.correlation < CORRELATION_FLOOR {
            health -=
                ((CORRELATION_FLOOR - stereo.correlation) / 1.2 * 20.0).clamp(0.0, 20.0);
        }
        if stereo.correlation < 0.0 {
            problems.push(Problem {
                kind: ProblemKind::PhaseIssue,
                severity: if stereo.correlation < -0.3 {
                    Severity::Severe
                } else {
                    Severity::Warning
                },
                message: format!(
                    "Channel correlation {:.2}; material will cancel in mono",
                    stereo.correlation
                ),
            });
            suggestions.push(Suggestion {
                category: SuggestionCategory::StereoImage,
                message: "Check polarity and stereo-widener settings; out-of-phase content collapses on mono playback".to_string(),
            });
        }
        if stereo.balance_db.is_finite() && stereo.balance_db.abs() > IMBALANCE_DB {
            problems.push(Problem {
                kind: ProblemKind::ChannelImbalance,
                severity: Severity::Info,
                message: format!(
                    "Channels differ by {:.1} dB ({} louder)",
                    stereo.balance_db.abs(),
                    if stereo.balance_db > 0.0 { "left" } else { "right" }
                ),
            });
        }
        if stereo.correlation > 0.98 && stereo.width < 0.1 {
            suggestions.push(Suggestion {
                category: SuggestionCategory::StereoImage,
                message: "Mix is effectively mono; consider adding stereo interest".to_string(),
            });
        }
    }

    if let Some(loudness) = loudness {
        if loudness.integrated_lufs.is_finite() {
            let low_edge = reference_lufs - LOUDNESS_BAND_BELOW;
            let high_edge = reference_lufs + LOUDNESS_BAND_ABOVE;
            if loudness.integrated_lufs < low_edge {
                suggestions.push(Suggestion {
                    category: SuggestionCategory::Loudness,
                    message: format!(
                        "Integrated loudness {:.1} LUFS sits below the {:.0} LUFS target; raise the overall level",
                        loudness.integrated_lufs, reference_lufs
                    ),
                });
            } else if loudness.integrated_lufs > high_edge {
                suggestions.push(Suggestion {
                    category: SuggestionCategory::Loudness,
                    message: format!(
                        "Integrated loudness {:.1} LUFS exceeds the {:.0} LUFS target; lower the overall level",
                        loudness.integrated_lufs, reference_lufs
                    ),
                });
            }
            if loudness.loudness_range_lu < NARROW_LRA_LU {
                suggestions.push(Suggestion {
                    category: SuggestionCategory::Dynamics,
                    message: format!(
                        "Loudness range of {:.1} LU suggests heavy compression",
                        loudness.loudness_range_lu
                    ),
                });
            }
        }
    }

    if let Some(tonal) = tonal {
        for descriptor in &tonal.descriptors {
            let message = match descriptor {
                BalanceDescriptor::Muddy => {
                    Some("Low band dominates the mids; try cutting 200-400 Hz")
                }
                BalanceDescriptor::Harsh => {
                    Some("High band runs hot; tame 4-8 kHz or soften the top end")
                }
                BalanceDescriptor::Thin => {
                    Some("Low end is underrepresented; reinforce 60-250 Hz")
                }
                BalanceDescriptor::Boomy => {
                    Some("Sub band overwhelms the bass; tighten below 60 Hz")
                }
                BalanceDescriptor::Balanced => None,
            };
            if let Some(message) = message {
                suggestions.push(Suggestion {
                    category: SuggestionCategory::TonalBalance,
                    message: message.to_string(),
                });
            }
        }
    }

    problems.sort_by(|a, b| b.severity.cmp(&a.severity));
    problems.truncate(MAX_PROBLEMS);
    suggestions.truncate(MAX_SUGGESTIONS);

    (health.clamp(0.0, 100.0) as f32, problems, suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::result::{AnalysisMetadata, FeatureResult};
    use crate::features::dynamics::DynamicsAnalysis;
    use crate::features::stereo::{MonoCompatibility, StereoAnalysis};

    fn empty_result() -> AnalysisResult {
        AnalysisResult {
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
            mix_health: 0.0,
            metadata: AnalysisMetadata {
                duration_seconds: 1.0,
                sample_rate: 48000,
                processing_time_ms: 0.0,
                engine_version: "test".to_string(),
                analyzers_run: vec![],
            },
        }
    }

    fn clean_dynamics() -> DynamicsAnalysis {
        DynamicsAnalysis {
            rms_db: -14.0,
            peak_db: -3.0,
            crest_factor_db: 11.0,
            dynamic_range_db: 12.0,
            clipping_events: 0,
            clipped_sample_ratio: 0.0,
            dc_offset: [0.0, 0.0],
            dc_offset_flagged: false,
            snr_estimate_db: 40.0,
        }
    }

    #[test]
    fn test_clean_material_scores_high() {
        let mut result = empty_result();
        result.dynamics = Some(FeatureResult::Success(clean_dynamics()));
        let (health, problems, _) = derive_diagnostics(&result, -23.0);
        assert_eq!(health, 100.0);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_clipping_costs_health_and_reports() {
        let mut result = empty_result();
        let mut dynamics = clean_dynamics();
        dynamics.clipped_sample_ratio = 0.05; // 5% of samples
        dynamics.clipping_events = 120;
        result.dynamics = Some(FeatureResult::Success(dynamics));

        let (health, problems, _) = derive_diagnostics(&result, -23.0);
        assert!(health <= 70.0, "5% clipping should cost the cap, health {}", health);
        assert!(problems.iter().any(|p| p.kind == ProblemKind::Clipping));
        assert_eq!(problems[0].severity, Severity::Severe);
    }

    #[test]
    fn test_phase_issue_detected() {
        let mut result = empty_result();
        result.stereo = Some(FeatureResult::Success(StereoAnalysis {
            correlation: -0.8,
            width: 1.8,
            balance_db: 0.0,
            phase_coherence: 0.1,
            mono_compatibility: MonoCompatibility::Poor,
            bands: vec![],
        }));
        let (health, problems, suggestions) = derive_diagnostics(&result, -23.0);
        assert!(health < 90.0);
        assert!(problems.iter().any(|p| p.kind == ProblemKind::PhaseIssue));
        assert!(suggestions
            .iter()
            .any(|s| s.category == SuggestionCategory::StereoImage));
    }

    #[test]
    fn test_failed_features_contribute_nothing() {
        let mut result = empty_result();
        result.dynamics = Some(FeatureResult::Failed("timeout".to_string()));
        result.stereo = Some(FeatureResult::Failed("timeout".to_string()));
        let (health, problems, suggestions) = derive_diagnostics(&result, -23.0);
        assert_eq!(health, 100.0);
        assert!(problems.is_empty());
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_caps_hold() {
        let mut result = empty_result();
        let mut dynamics = clean_dynamics();
        dynamics.clipped_sample_ratio = 0.1;
        dynamics.dynamic_range_db = 1.0;
        dynamics.crest_factor_db = 2.0;
        dynamics.dc_offset = [0.05, 0.05];
        dynamics.dc_offset_flagged = true;
        result.dynamics = Some(FeatureResult::Success(dynamics));
        result.stereo = Some(FeatureResult::Success(StereoAnalysis {
            correlation: -0.9,
            width: 2.0,
            balance_db: 8.0,
            phase_coherence: 0.0,
            mono_compatibility: MonoCompatibility::Poor,
            bands: vec![],
        }));
        let (health, problems, suggestions) = derive_diagnostics(&result, -23.0);
        assert!(problems.len() <= 8);
        assert!(suggestions.len() <= 10);
        assert!(health >= 0.0);
    }
}
