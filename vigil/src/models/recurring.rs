use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;

use super::SearchType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Applied multiplicatively to the raw LLM confidence.
    pub fn multiplier(&self) -> f32 {
        match self {
            Self::Low => 0.8,
            Self::Medium => 1.0,
            Self::High => 1.2,
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown sensitivity: {s}")),
        }
    }
}

/// One entry in the append-only list of prompt refinements. Refinements
/// are never edited in place so a bad one can be rolled back by
/// appending a superseding entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRefinement {
    pub text: String,
    pub origin: RuleOrigin,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

pub use super::suppression::RuleOrigin;

/// A user-configured recurring search and its analysis tuning.
/// Threshold fields left unset fall back to the tenant-level defaults
/// via [`resolve_analysis_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringSearchConfig {
    pub search_id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub query: String,
    pub search_type: SearchType,
    /// Interval between scheduled runs, in seconds. None means on-demand only.
    pub schedule_interval_secs: Option<i64>,
    /// Explicitly user-set sensitivity wins over any learned recommendation.
    pub sensitivity: Sensitivity,
    pub recommended_sensitivity: Option<Sensitivity>,
    pub confidence_threshold: Option<f32>,
    pub volume_threshold: Option<i64>,
    pub volume_threshold_percent: Option<f32>,
    pub require_both_thresholds: bool,
    pub custom_prompt: Option<String>,
    pub focus_areas: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub prompt_refinements: Vec<PromptRefinement>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringSearchConfig {
    pub fn new(
        search_id: String,
        tenant_id: String,
        project_id: String,
        query: String,
        search_type: SearchType,
    ) -> Self {
        let now = Utc::now();
        Self {
            search_id,
            tenant_id,
            project_id,
            query,
            search_type,
            schedule_interval_secs: None,
            sensitivity: Sensitivity::default(),
            recommended_sensitivity: None,
            confidence_threshold: None,
            volume_threshold: None,
            volume_threshold_percent: None,
            require_both_thresholds: false,
            custom_prompt: None,
            focus_areas: Vec::new(),
            ignore_patterns: Vec::new(),
            prompt_refinements: Vec::new(),
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refinements currently applied to the comparison prompt.
    pub fn active_refinements(&self) -> impl Iterator<Item = &PromptRefinement> {
        self.prompt_refinements.iter().filter(|r| r.active)
    }
}

/// The thresholds actually used for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveAnalysisConfig {
    pub sensitivity: Sensitivity,
    pub confidence_threshold: f32,
    pub volume_threshold: i64,
    pub volume_threshold_percent: f32,
    pub require_both_thresholds: bool,
}

/// Two-layer config resolution: tenant-level defaults overlaid with
/// per-search overrides. Pure; never mutates either input.
pub fn resolve_analysis_config(
    defaults: &AnalysisConfig,
    search: &RecurringSearchConfig,
) -> EffectiveAnalysisConfig {
    EffectiveAnalysisConfig {
        sensitivity: search.sensitivity,
        confidence_threshold: search
            .confidence_threshold
            .unwrap_or(defaults.confidence_threshold),
        volume_threshold: search.volume_threshold.unwrap_or(defaults.volume_threshold),
        volume_threshold_percent: search
            .volume_threshold_percent
            .unwrap_or(defaults.volume_threshold_percent),
        require_both_thresholds: search.require_both_thresholds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AnalysisConfig {
        AnalysisConfig {
            confidence_threshold: 0.70,
            volume_threshold: 3,
            volume_threshold_percent: 20.0,
            comparison_timeout_secs: 30,
        }
    }

    fn search() -> RecurringSearchConfig {
        RecurringSearchConfig::new(
            "s1".into(),
            "t1".into(),
            "p1".into(),
            "rust releases".into(),
            SearchType::News,
        )
    }

    #[test]
    fn test_resolve_uses_defaults_when_unset() {
        let eff = resolve_analysis_config(&defaults(), &search());
        assert_eq!(eff.confidence_threshold, 0.70);
        assert_eq!(eff.volume_threshold, 3);
        assert_eq!(eff.volume_threshold_percent, 20.0);
        assert!(!eff.require_both_thresholds);
    }

    #[test]
    fn test_resolve_prefers_overrides() {
        let mut s = search();
        s.confidence_threshold = Some(0.9);
        s.volume_threshold = Some(10);
        let eff = resolve_analysis_config(&defaults(), &s);
        assert_eq!(eff.confidence_threshold, 0.9);
        assert_eq!(eff.volume_threshold, 10);
        // Percent stays at the tenant default.
        assert_eq!(eff.volume_threshold_percent, 20.0);
    }

    #[test]
    fn test_sensitivity_multipliers() {
        assert_eq!(Sensitivity::Low.multiplier(), 0.8);
        assert_eq!(Sensitivity::Medium.multiplier(), 1.0);
        assert_eq!(Sensitivity::High.multiplier(), 1.2);
    }

    #[test]
    fn test_active_refinements_filters_inactive() {
        let mut s = search();
        s.prompt_refinements.push(PromptRefinement {
            text: "ignore paywalled reposts".into(),
            origin: RuleOrigin::LearningSystem,
            created_at: Utc::now(),
            active: true,
        });
        s.prompt_refinements.push(PromptRefinement {
            text: "rolled back".into(),
            origin: RuleOrigin::LearningSystem,
            created_at: Utc::now(),
            active: false,
        });
        assert_eq!(s.active_refinements().count(), 1);
    }
}
