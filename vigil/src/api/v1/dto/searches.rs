//! Recurring search request/response DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    RecurringSearchConfig, SearchResult, SearchType, Sensitivity,
};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Request body for `POST /v1/searches`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSearchRequest {
    /// Tenant owning the search.
    #[validate(length(min = 1, message = "tenantId cannot be empty"))]
    pub tenant_id: String,
    /// Project scope within the tenant.
    #[validate(length(min = 1, message = "projectId cannot be empty"))]
    pub project_id: String,
    /// The query executed on every run.
    #[validate(length(min = 1, max = 512, message = "query must be 1-512 characters"))]
    pub query: String,
    /// Provider chain selector. Defaults to `general`.
    pub search_type: Option<SearchType>,
    /// Interval between scheduled runs, in seconds. Omit for on-demand only.
    pub schedule_interval_secs: Option<i64>,
    pub sensitivity: Option<Sensitivity>,
    #[validate(range(min = 0.0, max = 1.0, message = "confidenceThreshold must be in [0, 1]"))]
    pub confidence_threshold: Option<f32>,
    pub volume_threshold: Option<i64>,
    pub volume_threshold_percent: Option<f32>,
    pub require_both_thresholds: Option<bool>,
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Request body for `PATCH /v1/searches/{searchId}`. Absent fields keep
/// their current value.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSearchRequest {
    #[validate(length(min = 1, max = 512, message = "query must be 1-512 characters"))]
    pub query: Option<String>,
    pub search_type: Option<SearchType>,
    pub schedule_interval_secs: Option<i64>,
    pub sensitivity: Option<Sensitivity>,
    #[validate(range(min = 0.0, max = 1.0, message = "confidenceThreshold must be in [0, 1]"))]
    pub confidence_threshold: Option<f32>,
    pub volume_threshold: Option<i64>,
    pub volume_threshold_percent: Option<f32>,
    pub require_both_thresholds: Option<bool>,
    pub custom_prompt: Option<String>,
    pub focus_areas: Option<Vec<String>>,
    pub ignore_patterns: Option<Vec<String>>,
}

/// Query parameters for `GET /v1/searches`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSearchesQuery {
    pub tenant_id: String,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Full recurring search response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfigResponse {
    pub search_id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub query: String,
    pub search_type: SearchType,
    pub schedule_interval_secs: Option<i64>,
    pub sensitivity: Sensitivity,
    /// Learning-system recommendation; advisory until the user adopts it.
    pub recommended_sensitivity: Option<Sensitivity>,
    pub confidence_threshold: Option<f32>,
    pub volume_threshold: Option<i64>,
    pub volume_threshold_percent: Option<f32>,
    pub require_both_thresholds: bool,
    pub custom_prompt: Option<String>,
    pub focus_areas: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RecurringSearchConfig> for SearchConfigResponse {
    fn from(c: RecurringSearchConfig) -> Self {
        Self {
            search_id: c.search_id,
            tenant_id: c.tenant_id,
            project_id: c.project_id,
            query: c.query,
            search_type: c.search_type,
            schedule_interval_secs: c.schedule_interval_secs,
            sensitivity: c.sensitivity,
            recommended_sensitivity: c.recommended_sensitivity,
            confidence_threshold: c.confidence_threshold,
            volume_threshold: c.volume_threshold,
            volume_threshold_percent: c.volume_threshold_percent,
            require_both_thresholds: c.require_both_thresholds,
            custom_prompt: c.custom_prompt,
            focus_areas: c.focus_areas,
            ignore_patterns: c.ignore_patterns,
            last_executed_at: c.last_executed_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Response for `POST /v1/searches/{searchId}/trigger`. Scraping and
/// analysis continue in the background; subscribe to the events stream
/// for progress.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSearchResponse {
    pub search_id: String,
    pub execution_id: String,
    pub results: Vec<SearchResult>,
}

/// Response for `POST /v1/searches/{searchId}/cancel`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSearchResponse {
    pub search_id: String,
    /// False when no pipeline was running for the search.
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_create_request_rejects_empty_query() {
        let req = CreateSearchRequest {
            tenant_id: "t1".into(),
            project_id: "p1".into(),
            query: "".into(),
            search_type: None,
            schedule_interval_secs: None,
            sensitivity: None,
            confidence_threshold: None,
            volume_threshold: None,
            volume_threshold_percent: None,
            require_both_thresholds: None,
            custom_prompt: None,
            focus_areas: vec![],
            ignore_patterns: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_create_request_rejects_out_of_range_threshold() {
        let req = CreateSearchRequest {
            tenant_id: "t1".into(),
            project_id: "p1".into(),
            query: "rust releases".into(),
            search_type: None,
            schedule_interval_secs: None,
            sensitivity: None,
            confidence_threshold: Some(1.5),
            volume_threshold: None,
            volume_threshold_percent: None,
            require_both_thresholds: None,
            custom_prompt: None,
            focus_areas: vec![],
            ignore_patterns: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let body = serde_json::json!({
            "tenantId": "t1",
            "projectId": "p1",
            "query": "acme corp layoffs",
            "searchType": "news",
            "scheduleIntervalSecs": 3600
        });
        let req: CreateSearchRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.search_type, Some(SearchType::News));
        assert_eq!(req.schedule_interval_secs, Some(3600));
        assert!(req.validate().is_ok());
    }
}
