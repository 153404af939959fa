use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Alert, AlertFeedback, AlertStatus, AnalysisState, FeedbackKind, NotificationRecord,
    RecurringSearchConfig, Sensitivity, SearchExecution, SuppressionRule, WebPageDocument,
};

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// Immutable search execution records plus their analysis-state column.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, execution: &SearchExecution) -> Result<()>;
    async fn get_execution(&self, id: &str) -> Result<Option<SearchExecution>>;
    /// The most recent execution for a search, by sequence number.
    async fn latest_execution(&self, search_id: &str) -> Result<Option<SearchExecution>>;
    async fn set_analysis_state(&self, id: &str, state: AnalysisState) -> Result<()>;
    /// Highest seq for the search that has reached a terminal analysis
    /// state. Used to reject out-of-order analysis.
    async fn max_terminal_seq(&self, search_id: &str) -> Result<Option<i64>>;
    /// Next sequence number for the search (1 for a first execution).
    async fn next_seq(&self, search_id: &str) -> Result<i64>;
}

/// TTL-bound scraped pages, partitioned by (tenant, project, source query).
/// Reads must never return an expired page even when physical deletion lags.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn put_page(&self, page: &WebPageDocument) -> Result<()>;
    async fn query_recent(
        &self,
        tenant_id: &str,
        project_id: &str,
        source_query: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebPageDocument>>;
    /// Physically delete pages past their TTL. Returns rows removed.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Recurring search configuration CRUD plus scheduler support.
#[async_trait]
pub trait RecurringSearchStore: Send + Sync {
    async fn create_recurring(&self, config: &RecurringSearchConfig) -> Result<()>;
    async fn get_recurring(&self, search_id: &str) -> Result<Option<RecurringSearchConfig>>;
    async fn update_recurring(&self, config: &RecurringSearchConfig) -> Result<()>;
    async fn delete_recurring(&self, search_id: &str) -> Result<bool>;
    async fn list_recurring(&self, tenant_id: &str) -> Result<Vec<RecurringSearchConfig>>;
    /// Searches whose schedule interval has elapsed since last execution.
    async fn due_searches(&self, now: DateTime<Utc>) -> Result<Vec<RecurringSearchConfig>>;
    async fn set_last_executed(&self, search_id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn set_recommended_sensitivity(
        &self,
        search_id: &str,
        sensitivity: Sensitivity,
    ) -> Result<()>;
}

/// Alert persistence. `create_alert` hits the unique
/// (search_id, execution_id) index; callers treat a conflict as "already
/// alerted" rather than an error.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create_alert(&self, alert: &Alert) -> Result<()>;
    async fn alert_exists(&self, search_id: &str, execution_id: &str) -> Result<bool>;
    async fn get_alert(&self, id: &str) -> Result<Option<Alert>>;
    async fn list_alerts(
        &self,
        tenant_id: &str,
        search_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Alert>>;
    async fn update_alert_status(
        &self,
        id: &str,
        status: AlertStatus,
        snooze_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn set_alert_feedback(
        &self,
        id: &str,
        feedback: FeedbackKind,
        comment: Option<&str>,
    ) -> Result<()>;
    async fn update_alert_notifications(
        &self,
        id: &str,
        notifications: &[NotificationRecord],
    ) -> Result<()>;
    /// Feedback on the most recent alert (by trigger time) for the search,
    /// if any was given. Drives the scorer's consistency boost.
    async fn latest_alert_feedback(&self, search_id: &str) -> Result<Option<FeedbackKind>>;
    /// Most recent alerts marked irrelevant, newest first.
    async fn recent_irrelevant_alerts(&self, search_id: &str, limit: u32) -> Result<Vec<Alert>>;
}

/// Suppression rules; soft delete only — a learned rule that misfires has
/// no automatic reconciliation path beyond the user removing it.
#[async_trait]
pub trait SuppressionStore: Send + Sync {
    async fn create_rule(&self, rule: &SuppressionRule) -> Result<()>;
    async fn active_rules(&self, search_id: &str) -> Result<Vec<SuppressionRule>>;
    async fn soft_delete_rule(&self, id: &str) -> Result<bool>;
    async fn bump_applied_count(&self, id: &str) -> Result<()>;
}

/// Append-only alert feedback.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append_feedback(&self, feedback: &AlertFeedback) -> Result<()>;
    async fn feedback_count(&self, search_id: &str) -> Result<i64>;
    /// Newest first, capped at `limit`.
    async fn recent_feedback(&self, search_id: &str, limit: u32) -> Result<Vec<AlertFeedback>>;
}

// ---------------------------------------------------------------------------
// Combined backend
// ---------------------------------------------------------------------------

pub trait DatabaseBackend:
    ExecutionStore
    + PageStore
    + RecurringSearchStore
    + AlertStore
    + SuppressionStore
    + FeedbackStore
    + Send
    + Sync
{
}

impl<T> DatabaseBackend for T where
    T: ExecutionStore
        + PageStore
        + RecurringSearchStore
        + AlertStore
        + SuppressionStore
        + FeedbackStore
        + Send
        + Sync
{
}
