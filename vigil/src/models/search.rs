use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    General,
    News,
    Finance,
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::News => write!(f, "news"),
            Self::Finance => write!(f, "finance"),
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "news" => Ok(Self::News),
            "finance" => Ok(Self::Finance),
            _ => Err(format!("Unknown search type: {s}")),
        }
    }
}

/// One hit returned by a search provider. Embedded in a [`SearchExecution`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub relevance_score: f32,
}

/// One run of a (possibly recurring) search. Immutable once created;
/// only `analysis_state` moves as delta analysis progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchExecution {
    pub id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub search_id: String,
    pub query: String,
    pub search_type: SearchType,
    pub executed_at: DateTime<Utc>,
    pub results: Vec<SearchResult>,
    pub previous_execution_id: Option<String>,
    /// Monotonic per-search sequence number, assigned at creation.
    /// Delta analysis uses it to reject out-of-order invocations.
    pub seq: i64,
    pub analysis_state: AnalysisState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    /// Not analyzed yet (or never will be: first execution, cancelled batch).
    #[default]
    Pending,
    Alerted,
    Suppressed,
    NoChange,
    Failed,
    Cancelled,
}

impl AnalysisState {
    /// Terminal states count for the out-of-order guard: once a newer
    /// execution has reached one, older executions must not be analyzed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Alerted => write!(f, "alerted"),
            Self::Suppressed => write!(f, "suppressed"),
            Self::NoChange => write!(f, "no_change"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for AnalysisState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "alerted" => Ok(Self::Alerted),
            "suppressed" => Ok(Self::Suppressed),
            "no_change" => Ok(Self::NoChange),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown analysis state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_search_type_round_trip() {
        for t in [SearchType::General, SearchType::News, SearchType::Finance] {
            assert_eq!(SearchType::from_str(&t.to_string()).unwrap(), t);
        }
    }

    #[test]
    fn test_analysis_state_terminal() {
        assert!(!AnalysisState::Pending.is_terminal());
        assert!(AnalysisState::Alerted.is_terminal());
        assert!(AnalysisState::NoChange.is_terminal());
        assert!(AnalysisState::Cancelled.is_terminal());
    }
}
