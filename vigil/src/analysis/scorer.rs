use crate::models::{EffectiveAnalysisConfig, Sensitivity};

/// Everything that feeds the final confidence besides the thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub llm_confidence: f32,
    pub sensitivity: Sensitivity,
    /// Fraction of recent alerts for this search marked irrelevant.
    pub trailing_fp_rate: f32,
    /// Whether the immediately preceding alert was marked relevant.
    pub previous_alert_relevant: bool,
}

const FP_PENALTY_THRESHOLD: f32 = 0.3;
const FP_PENALTY: f32 = 0.9;
const CONSISTENCY_BOOST: f32 = 1.05;

pub fn final_confidence(inputs: &ScoreInputs) -> f32 {
    let fp_penalty = if inputs.trailing_fp_rate > FP_PENALTY_THRESHOLD {
        FP_PENALTY
    } else {
        1.0
    };
    let consistency_boost = if inputs.previous_alert_relevant {
        CONSISTENCY_BOOST
    } else {
        1.0
    };

    (inputs.llm_confidence * inputs.sensitivity.multiplier() * fp_penalty * consistency_boost)
        .clamp(0.0, 1.0)
}

/// Volume gate over the result-count delta between executions. The delta
/// is directionless: a shrinking result set is as notable as a growing one.
pub fn volume_triggered(
    config: &EffectiveAnalysisConfig,
    previous_count: usize,
    current_count: usize,
) -> bool {
    let delta = previous_count.abs_diff(current_count) as i64;
    let percent = if previous_count == 0 {
        if current_count == 0 {
            0.0
        } else {
            100.0
        }
    } else {
        delta as f32 / previous_count as f32 * 100.0
    };

    let volume_hit = delta >= config.volume_threshold;
    let percent_hit = percent >= config.volume_threshold_percent;

    if config.require_both_thresholds {
        volume_hit && percent_hit
    } else {
        volume_hit || percent_hit
    }
}

pub fn should_alert(
    config: &EffectiveAnalysisConfig,
    final_confidence: f32,
    previous_count: usize,
    current_count: usize,
) -> bool {
    final_confidence >= config.confidence_threshold
        && volume_triggered(config, previous_count, current_count)
}
