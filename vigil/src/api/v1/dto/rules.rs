//! Suppression rule DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{RuleOrigin, RuleType, SuppressionRule};

/// Request body for `POST /v1/searches/{searchId}/rules`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    pub rule_type: RuleType,
    /// keyword: lowercase term; source: domain; pattern: regex;
    /// semantic: free-text matched against alert summaries.
    #[validate(length(min = 1, max = 512, message = "condition must be 1-512 characters"))]
    pub condition: String,
}

/// Full suppression rule response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    pub rule_id: String,
    pub search_id: String,
    pub tenant_id: String,
    pub rule_type: RuleType,
    pub condition: String,
    pub created_by: RuleOrigin,
    /// Times the rule has suppressed an alert.
    pub applied_count: i64,
    pub effectiveness: f32,
    pub created_at: DateTime<Utc>,
}

impl From<SuppressionRule> for RuleResponse {
    fn from(r: SuppressionRule) -> Self {
        Self {
            rule_id: r.id,
            search_id: r.search_id,
            tenant_id: r.tenant_id,
            rule_type: r.rule_type,
            condition: r.condition,
            created_by: r.created_by,
            applied_count: r.applied_count,
            effectiveness: r.effectiveness,
            created_at: r.created_at,
        }
    }
}
