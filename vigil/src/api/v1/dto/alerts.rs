//! Alert request/response DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Alert, AlertStatus, FeedbackKind, NotificationRecord};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Query parameters for `GET /v1/alerts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertsQuery {
    pub tenant_id: String,
    /// Restrict to one recurring search.
    pub search_id: Option<String>,
    /// Maximum results, clamped to `1..=100`. Defaults to 20.
    pub limit: Option<u32>,
}

impl ListAlertsQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

/// Request body for `PATCH /v1/alerts/{alertId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    pub status: AlertStatus,
    /// Required when status is `snoozed`, ignored otherwise.
    pub snooze_until: Option<DateTime<Utc>>,
}

/// Request body for `POST /v1/alerts/{alertId}/feedback`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AlertFeedbackRequest {
    #[validate(length(min = 1, message = "userId cannot be empty"))]
    pub user_id: String,
    pub feedback: FeedbackKind,
    #[validate(length(max = 2000, message = "comment too long"))]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Full alert response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub alert_id: String,
    pub search_id: String,
    pub tenant_id: String,
    pub execution_id: String,
    pub triggered_at: DateTime<Utc>,
    pub confidence: f32,
    pub summary: String,
    pub key_changes: Vec<String>,
    pub reasoning: String,
    pub citations: Vec<String>,
    pub status: AlertStatus,
    pub feedback: Option<FeedbackKind>,
    pub feedback_comment: Option<String>,
    pub snooze_until: Option<DateTime<Utc>>,
    pub notifications: Vec<NotificationRecord>,
}

impl From<Alert> for AlertResponse {
    fn from(a: Alert) -> Self {
        Self {
            alert_id: a.id,
            search_id: a.search_id,
            tenant_id: a.tenant_id,
            execution_id: a.execution_id,
            triggered_at: a.triggered_at,
            confidence: a.confidence,
            summary: a.summary,
            key_changes: a.key_changes,
            reasoning: a.reasoning,
            citations: a.citations,
            status: a.status,
            feedback: a.feedback,
            feedback_comment: a.feedback_comment,
            snooze_until: a.snooze_until,
            notifications: a.notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        let q = ListAlertsQuery {
            tenant_id: "t1".into(),
            search_id: None,
            limit: Some(5000),
        };
        assert_eq!(q.effective_limit(), 100);

        let q = ListAlertsQuery {
            tenant_id: "t1".into(),
            search_id: None,
            limit: None,
        };
        assert_eq!(q.effective_limit(), 20);
    }

    #[test]
    fn test_feedback_request_wire_format() {
        let body = serde_json::json!({
            "userId": "u1",
            "feedback": "irrelevant",
            "comment": "routine press release"
        });
        let req: AlertFeedbackRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.feedback, FeedbackKind::Irrelevant);
    }
}
