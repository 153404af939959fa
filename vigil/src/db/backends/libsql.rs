use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::Database;
use crate::db::repository::{
    AlertRepository, ExecutionRepository, FeedbackRepository, PageRepository,
    RecurringSearchRepository, SuppressionRepository,
};
use crate::db::traits::{
    AlertStore, ExecutionStore, FeedbackStore, PageStore, RecurringSearchStore, SuppressionStore,
};
use crate::error::Result;
use crate::models::{
    Alert, AlertFeedback, AlertStatus, AnalysisState, FeedbackKind, NotificationRecord,
    RecurringSearchConfig, Sensitivity, SearchExecution, SuppressionRule, WebPageDocument,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExecutionStore for LibSqlBackend {
    async fn create_execution(&self, execution: &SearchExecution) -> Result<()> {
        let conn = self.db.connect()?;
        ExecutionRepository::create(&conn, execution).await
    }
    async fn get_execution(&self, id: &str) -> Result<Option<SearchExecution>> {
        let conn = self.db.connect()?;
        ExecutionRepository::get_by_id(&conn, id).await
    }
    async fn latest_execution(&self, search_id: &str) -> Result<Option<SearchExecution>> {
        let conn = self.db.connect()?;
        ExecutionRepository::latest(&conn, search_id).await
    }
    async fn set_analysis_state(&self, id: &str, state: AnalysisState) -> Result<()> {
        let conn = self.db.connect()?;
        ExecutionRepository::set_analysis_state(&conn, id, state).await
    }
    async fn max_terminal_seq(&self, search_id: &str) -> Result<Option<i64>> {
        let conn = self.db.connect()?;
        ExecutionRepository::max_terminal_seq(&conn, search_id).await
    }
    async fn next_seq(&self, search_id: &str) -> Result<i64> {
        let conn = self.db.connect()?;
        ExecutionRepository::next_seq(&conn, search_id).await
    }
}

#[async_trait]
impl PageStore for LibSqlBackend {
    async fn put_page(&self, page: &WebPageDocument) -> Result<()> {
        let conn = self.db.connect()?;
        PageRepository::put(&conn, page).await
    }
    async fn query_recent(
        &self,
        tenant_id: &str,
        project_id: &str,
        source_query: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebPageDocument>> {
        let conn = self.db.connect()?;
        PageRepository::query_recent(&conn, tenant_id, project_id, source_query, since, now).await
    }
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let conn = self.db.connect()?;
        PageRepository::sweep_expired(&conn, now).await
    }
}

#[async_trait]
impl RecurringSearchStore for LibSqlBackend {
    async fn create_recurring(&self, config: &RecurringSearchConfig) -> Result<()> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::create(&conn, config).await
    }
    async fn get_recurring(&self, search_id: &str) -> Result<Option<RecurringSearchConfig>> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::get(&conn, search_id).await
    }
    async fn update_recurring(&self, config: &RecurringSearchConfig) -> Result<()> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::update(&conn, config).await
    }
    async fn delete_recurring(&self, search_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::delete(&conn, search_id).await
    }
    async fn list_recurring(&self, tenant_id: &str) -> Result<Vec<RecurringSearchConfig>> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::list(&conn, tenant_id).await
    }
    async fn due_searches(&self, now: DateTime<Utc>) -> Result<Vec<RecurringSearchConfig>> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::due(&conn, now).await
    }
    async fn set_last_executed(&self, search_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::set_last_executed(&conn, search_id, at).await
    }
    async fn set_recommended_sensitivity(
        &self,
        search_id: &str,
        sensitivity: Sensitivity,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        RecurringSearchRepository::set_recommended_sensitivity(&conn, search_id, sensitivity).await
    }
}

#[async_trait]
impl AlertStore for LibSqlBackend {
    async fn create_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.db.connect()?;
        AlertRepository::create(&conn, alert).await
    }
    async fn alert_exists(&self, search_id: &str, execution_id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        AlertRepository::exists(&conn, search_id, execution_id).await
    }
    async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let conn = self.db.connect()?;
        AlertRepository::get_by_id(&conn, id).await
    }
    async fn list_alerts(
        &self,
        tenant_id: &str,
        search_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Alert>> {
        let conn = self.db.connect()?;
        AlertRepository::list(&conn, tenant_id, search_id, limit).await
    }
    async fn update_alert_status(
        &self,
        id: &str,
        status: AlertStatus,
        snooze_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        AlertRepository::update_status(&conn, id, status, snooze_until).await
    }
    async fn set_alert_feedback(
        &self,
        id: &str,
        feedback: FeedbackKind,
        comment: Option<&str>,
    ) -> Result<()> {
        let conn = self.db.connect()?;
        AlertRepository::set_feedback(&conn, id, feedback, comment).await
    }
    async fn update_alert_notifications(
        &self,
        id: &str,
        notifications: &[NotificationRecord],
    ) -> Result<()> {
        let conn = self.db.connect()?;
        AlertRepository::update_notifications(&conn, id, notifications).await
    }
    async fn latest_alert_feedback(&self, search_id: &str) -> Result<Option<FeedbackKind>> {
        let conn = self.db.connect()?;
        AlertRepository::latest_feedback(&conn, search_id).await
    }
    async fn recent_irrelevant_alerts(&self, search_id: &str, limit: u32) -> Result<Vec<Alert>> {
        let conn = self.db.connect()?;
        AlertRepository::recent_irrelevant(&conn, search_id, limit).await
    }
}

#[async_trait]
impl SuppressionStore for LibSqlBackend {
    async fn create_rule(&self, rule: &SuppressionRule) -> Result<()> {
        let conn = self.db.connect()?;
        SuppressionRepository::create(&conn, rule).await
    }
    async fn active_rules(&self, search_id: &str) -> Result<Vec<SuppressionRule>> {
        let conn = self.db.connect()?;
        SuppressionRepository::active_for_search(&conn, search_id).await
    }
    async fn soft_delete_rule(&self, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        SuppressionRepository::soft_delete(&conn, id).await
    }
    async fn bump_applied_count(&self, id: &str) -> Result<()> {
        let conn = self.db.connect()?;
        SuppressionRepository::bump_applied_count(&conn, id).await
    }
}

#[async_trait]
impl FeedbackStore for LibSqlBackend {
    async fn append_feedback(&self, feedback: &AlertFeedback) -> Result<()> {
        let conn = self.db.connect()?;
        FeedbackRepository::append(&conn, feedback).await
    }
    async fn feedback_count(&self, search_id: &str) -> Result<i64> {
        let conn = self.db.connect()?;
        FeedbackRepository::count_for_search(&conn, search_id).await
    }
    async fn recent_feedback(&self, search_id: &str, limit: u32) -> Result<Vec<AlertFeedback>> {
        let conn = self.db.connect()?;
        FeedbackRepository::recent_for_search(&conn, search_id, limit).await
    }
}
