use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Keyword,
    Source,
    Pattern,
    Semantic,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword => write!(f, "keyword"),
            Self::Source => write!(f, "source"),
            Self::Pattern => write!(f, "pattern"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "source" => Ok(Self::Source),
            "pattern" => Ok(Self::Pattern),
            "semantic" => Ok(Self::Semantic),
            _ => Err(format!("Unknown rule type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RuleOrigin {
    User,
    LearningSystem,
}

impl std::fmt::Display for RuleOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::LearningSystem => write!(f, "learning-system"),
        }
    }
}

impl std::str::FromStr for RuleOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "learning-system" => Ok(Self::LearningSystem),
            _ => Err(format!("Unknown rule origin: {s}")),
        }
    }
}

/// A condition that blocks an alert regardless of confidence.
/// Learned rules can only be removed by the user deleting them;
/// there is no automatic reconciliation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub id: String,
    pub search_id: String,
    pub tenant_id: String,
    pub rule_type: RuleType,
    /// keyword: lowercase term; source: domain; pattern: regex over
    /// result titles/snippets; semantic: free-text description matched
    /// against the LLM summary.
    pub condition: String,
    pub created_by: RuleOrigin,
    pub applied_count: i64,
    pub effectiveness: f32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SuppressionRule {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
