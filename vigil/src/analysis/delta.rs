use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use nanoid::nanoid;

use crate::analysis::scorer::{final_confidence, should_alert, ScoreInputs};
use crate::analysis::suppression::first_matching_rule;
use crate::config::AnalysisConfig;
use crate::db::DatabaseBackend;
use crate::error::{Result, VigilError};
use crate::llm::prompts::{comparison_prompt, ComparisonOutcome};
use crate::llm::LlmProvider;
use crate::models::{Alert, AlertStatus, AnalysisState, FeedbackKind, SearchExecution};

/// How one analysis run ended. Terminal execution states are written to
/// the executions table as a side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Another analysis for the same search is running right now.
    InFlight,
    /// The execution already reached a terminal state earlier.
    AlreadyAnalyzed,
    /// First execution of the search; nothing to compare against.
    NoPrevious,
    /// A newer execution of the search already finished analysis.
    OutOfOrder,
    /// An alert for this (search, execution) pair already exists.
    AlreadyAlerted,
    Alerted { alert_id: String },
    Suppressed { rule_id: String },
    NoChange,
    Failed { reason: String },
}

/// Compares consecutive executions of a recurring search and decides
/// whether the change is worth an alert. One run per search at a time;
/// concurrent triggers for the same search are turned away, not queued.
pub struct DeltaAnalyzer {
    db: Arc<dyn DatabaseBackend>,
    llm: LlmProvider,
    defaults: AnalysisConfig,
    fp_rate_window: u32,
    in_flight: Mutex<HashSet<String>>,
}

struct FlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

impl DeltaAnalyzer {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        llm: LlmProvider,
        defaults: AnalysisConfig,
        fp_rate_window: u32,
    ) -> Self {
        Self {
            db,
            llm,
            defaults,
            fp_rate_window,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn analyze(&self, execution_id: &str) -> Result<AnalysisOutcome> {
        let execution = self
            .db
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("execution {execution_id}")))?;

        if execution.analysis_state.is_terminal() {
            return Ok(AnalysisOutcome::AlreadyAnalyzed);
        }

        let _guard = match self.acquire(&execution.search_id) {
            Some(guard) => guard,
            None => return Ok(AnalysisOutcome::InFlight),
        };

        // Reject stale executions once a newer one has finished.
        if let Some(max_seq) = self.db.max_terminal_seq(&execution.search_id).await? {
            if max_seq >= execution.seq {
                tracing::info!(
                    execution_id,
                    seq = execution.seq,
                    max_terminal_seq = max_seq,
                    "Skipping out-of-order analysis"
                );
                self.db
                    .set_analysis_state(execution_id, AnalysisState::Cancelled)
                    .await?;
                return Ok(AnalysisOutcome::OutOfOrder);
            }
        }

        let Some(previous_id) = execution.previous_execution_id.as_deref() else {
            self.db
                .set_analysis_state(execution_id, AnalysisState::NoChange)
                .await?;
            return Ok(AnalysisOutcome::NoPrevious);
        };

        let previous = self
            .db
            .get_execution(previous_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("execution {previous_id}")))?;

        if self
            .db
            .alert_exists(&execution.search_id, execution_id)
            .await?
        {
            self.db
                .set_analysis_state(execution_id, AnalysisState::Alerted)
                .await?;
            return Ok(AnalysisOutcome::AlreadyAlerted);
        }

        let search = self
            .db
            .get_recurring(&execution.search_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("search {}", execution.search_id)))?;

        let deep_context = self.deep_context(&execution, &previous).await?;
        let prompt = comparison_prompt(&search, &previous.results, &execution.results, &deep_context);

        let outcome = match self.compare_with_retry(&prompt).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    execution_id,
                    search_id = %execution.search_id,
                    error = %err,
                    "Delta analysis failed, recording without alert"
                );
                self.db
                    .set_analysis_state(execution_id, AnalysisState::Failed)
                    .await?;
                return Ok(AnalysisOutcome::Failed {
                    reason: err.to_string(),
                });
            }
        };

        if !outcome.is_significant {
            self.db
                .set_analysis_state(execution_id, AnalysisState::NoChange)
                .await?;
            return Ok(AnalysisOutcome::NoChange);
        }

        // Suppression wins over any confidence score.
        let rules = self.db.active_rules(&execution.search_id).await?;
        if let Some(rule) = first_matching_rule(&rules, &execution.results, &outcome.summary) {
            self.db.bump_applied_count(&rule.id).await?;
            self.db
                .set_analysis_state(execution_id, AnalysisState::Suppressed)
                .await?;
            tracing::info!(
                execution_id,
                rule_id = %rule.id,
                rule_type = %rule.rule_type,
                "Change suppressed by rule"
            );
            return Ok(AnalysisOutcome::Suppressed {
                rule_id: rule.id.clone(),
            });
        }

        let effective =
            crate::models::resolve_analysis_config(&self.defaults, &search);
        let trailing_fp_rate = self.trailing_fp_rate(&execution.search_id).await?;
        let previous_alert_relevant = matches!(
            self.db.latest_alert_feedback(&execution.search_id).await?,
            Some(FeedbackKind::Relevant)
        );

        let confidence = final_confidence(&ScoreInputs {
            llm_confidence: outcome.confidence,
            sensitivity: effective.sensitivity,
            trailing_fp_rate,
            previous_alert_relevant,
        });

        if !should_alert(
            &effective,
            confidence,
            previous.results.len(),
            execution.results.len(),
        ) {
            self.db
                .set_analysis_state(execution_id, AnalysisState::NoChange)
                .await?;
            return Ok(AnalysisOutcome::NoChange);
        }

        let alert = Alert {
            id: format!("alrt_{}", nanoid!()),
            search_id: execution.search_id.clone(),
            tenant_id: execution.tenant_id.clone(),
            execution_id: execution.id.clone(),
            triggered_at: Utc::now(),
            confidence,
            summary: outcome.summary,
            key_changes: outcome.key_changes,
            reasoning: outcome.reasoning,
            citations: outcome.citations,
            status: AlertStatus::Unread,
            feedback: None,
            feedback_comment: None,
            snooze_until: None,
            notifications: Vec::new(),
        };

        // The unique (search_id, execution_id) index is the backstop for
        // a concurrent analyzer racing past the exists-check. Losing that
        // race means the alert exists, which is the outcome we wanted.
        match self.db.create_alert(&alert).await {
            Ok(()) => {}
            Err(err) if err.is_unique_violation() => {
                tracing::info!(
                    execution_id,
                    search_id = %execution.search_id,
                    "Alert already created by a concurrent run"
                );
                self.db
                    .set_analysis_state(execution_id, AnalysisState::Alerted)
                    .await?;
                return Ok(AnalysisOutcome::AlreadyAlerted);
            }
            Err(err) => return Err(err),
        }
        self.db
            .set_analysis_state(execution_id, AnalysisState::Alerted)
            .await?;

        Ok(AnalysisOutcome::Alerted { alert_id: alert.id })
    }

    fn acquire(&self, search_id: &str) -> Option<FlightGuard<'_>> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(search_id.to_string()) {
            return None;
        }
        Some(FlightGuard {
            set: &self.in_flight,
            key: search_id.to_string(),
        })
    }

    async fn compare_with_retry(&self, prompt: &str) -> Result<ComparisonOutcome> {
        match self.llm.complete_structured::<ComparisonOutcome>(prompt).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "Comparison call failed, retrying once");
                self.llm.complete_structured::<ComparisonOutcome>(prompt).await
            }
            Err(err) => Err(err),
        }
    }

    /// Excerpts from pages scraped since the previous execution, capped so
    /// the prompt stays bounded.
    async fn deep_context(
        &self,
        execution: &SearchExecution,
        previous: &SearchExecution,
    ) -> Result<Vec<String>> {
        const MAX_PAGES: usize = 3;
        const MAX_EXCERPT_CHARS: usize = 600;

        let pages = self
            .db
            .query_recent(
                &execution.tenant_id,
                &execution.project_id,
                &execution.query,
                previous.executed_at,
                Utc::now(),
            )
            .await?;

        Ok(pages
            .iter()
            .take(MAX_PAGES)
            .filter_map(|page| {
                let text = page
                    .chunks
                    .first()
                    .map(|c| c.text.as_str())
                    .unwrap_or(page.content.as_str());
                if text.is_empty() {
                    return None;
                }
                let excerpt: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
                Some(excerpt)
            })
            .collect())
    }

    async fn trailing_fp_rate(&self, search_id: &str) -> Result<f32> {
        let recent = self.db.recent_feedback(search_id, self.fp_rate_window).await?;
        if recent.is_empty() {
            return Ok(0.0);
        }
        let irrelevant = recent
            .iter()
            .filter(|f| f.feedback == FeedbackKind::Irrelevant)
            .count();
        Ok(irrelevant as f32 / recent.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend};
    use crate::models::{SearchResult, SearchType};
    use crate::models::{RecurringSearchConfig, RuleOrigin, RuleType, SuppressionRule};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend() -> Arc<dyn DatabaseBackend> {
        let db = Database::new(&DatabaseConfig {
            url: ":memory:".to_string(),
            auth_token: None,
            local_path: None,
        })
        .await
        .unwrap();
        Arc::new(LibSqlBackend::new(db))
    }

    fn llm_against(server: &MockServer) -> LlmProvider {
        LlmProvider::new(Some(&crate::config::LlmConfig {
            model: "custom/test-model".to_string(),
            api_key: Some("test".to_string()),
            base_url: Some(server.uri()),
            timeout_secs: 5,
            max_retries: 0,
        }))
    }

    fn analyzer(db: Arc<dyn DatabaseBackend>, llm: LlmProvider) -> DeltaAnalyzer {
        DeltaAnalyzer::new(
            db,
            llm,
            AnalysisConfig {
                confidence_threshold: 0.70,
                volume_threshold: 3,
                volume_threshold_percent: 20.0,
                comparison_timeout_secs: 30,
            },
            20,
        )
    }

    fn results(count: usize) -> Vec<SearchResult> {
        (0..count)
            .map(|i| SearchResult {
                title: format!("story {i}"),
                url: format!("https://news.example/{i}"),
                snippet: format!("snippet {i}"),
                source: "news.example".to_string(),
                published_at: None,
                relevance_score: 0.5,
            })
            .collect()
    }

    fn execution(
        id: &str,
        search_id: &str,
        seq: i64,
        previous: Option<&str>,
        result_count: usize,
    ) -> SearchExecution {
        SearchExecution {
            id: id.to_string(),
            tenant_id: "tenant-1".to_string(),
            project_id: "project-1".to_string(),
            search_id: search_id.to_string(),
            query: "acme acquisition".to_string(),
            search_type: SearchType::News,
            executed_at: Utc::now(),
            results: results(result_count),
            previous_execution_id: previous.map(String::from),
            seq,
            analysis_state: AnalysisState::Pending,
        }
    }

    async fn seed_search(db: &Arc<dyn DatabaseBackend>, search_id: &str) {
        let search = RecurringSearchConfig::new(
            search_id.to_string(),
            "tenant-1".to_string(),
            "project-1".to_string(),
            "acme acquisition".to_string(),
            SearchType::News,
        );
        db.create_recurring(&search).await.unwrap();
    }

    fn comparison_response(is_significant: bool, confidence: f32) -> serde_json::Value {
        let content = json!({
            "is_significant": is_significant,
            "confidence": confidence,
            "summary": "Acme confirmed the acquisition in a regulatory filing",
            "key_changes": ["Deal confirmed"],
            "reasoning": "Previously a rumor, now confirmed",
            "citations": ["https://news.example/0"]
        })
        .to_string();

        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    async fn mock_llm(server: &MockServer, is_significant: bool, confidence: f32) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(comparison_response(is_significant, confidence)),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn first_execution_short_circuits_without_llm() {
        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 5))
            .await
            .unwrap();

        // Unavailable LLM proves no call is attempted.
        let analyzer = analyzer(Arc::clone(&db), LlmProvider::unavailable("test"));
        let outcome = analyzer.analyze("exec_1").await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::NoPrevious);

        let stored = db.get_execution("exec_1").await.unwrap().unwrap();
        assert_eq!(stored.analysis_state, AnalysisState::NoChange);
    }

    #[tokio::test]
    async fn significant_change_above_thresholds_alerts_once() {
        let server = MockServer::start().await;
        mock_llm(&server, true, 0.9).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        let outcome = analyzer.analyze("exec_2").await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Alerted { .. }));

        // Re-running the same execution is a no-op.
        let repeat = analyzer.analyze("exec_2").await.unwrap();
        assert_eq!(repeat, AnalysisOutcome::AlreadyAnalyzed);

        let alerts = db.list_alerts("tenant-1", Some("srch_a"), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].execution_id, "exec_2");
    }

    #[tokio::test]
    async fn suppression_beats_full_confidence() {
        let server = MockServer::start().await;
        mock_llm(&server, true, 1.0).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_rule(&SuppressionRule {
            id: "rule_1".to_string(),
            search_id: "srch_a".to_string(),
            tenant_id: "tenant-1".to_string(),
            rule_type: RuleType::Source,
            condition: "news.example".to_string(),
            created_by: RuleOrigin::User,
            applied_count: 0,
            effectiveness: 0.0,
            created_at: Utc::now(),
            deleted_at: None,
        })
        .await
        .unwrap();

        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        let outcome = analyzer.analyze("exec_2").await.unwrap();
        assert_eq!(
            outcome,
            AnalysisOutcome::Suppressed {
                rule_id: "rule_1".to_string()
            }
        );

        assert!(db.list_alerts("tenant-1", None, 10).await.unwrap().is_empty());
        let rules = db.active_rules("srch_a").await.unwrap();
        assert_eq!(rules[0].applied_count, 1);
    }

    #[tokio::test]
    async fn out_of_order_execution_is_rejected() {
        let server = MockServer::start().await;
        mock_llm(&server, true, 0.9).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();
        db.create_execution(&execution("exec_3", "srch_a", 3, Some("exec_2"), 18))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        // The newer execution completes first.
        analyzer.analyze("exec_3").await.unwrap();

        let outcome = analyzer.analyze("exec_2").await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::OutOfOrder);
        let stored = db.get_execution("exec_2").await.unwrap().unwrap();
        assert_eq!(stored.analysis_state, AnalysisState::Cancelled);
    }

    #[tokio::test]
    async fn insignificant_change_records_no_change() {
        let server = MockServer::start().await;
        mock_llm(&server, false, 0.2).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        assert_eq!(
            analyzer.analyze("exec_2").await.unwrap(),
            AnalysisOutcome::NoChange
        );
    }

    #[tokio::test]
    async fn llm_failure_never_alerts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        let outcome = analyzer.analyze("exec_2").await.unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Failed { .. }));

        let stored = db.get_execution("exec_2").await.unwrap().unwrap();
        assert_eq!(stored.analysis_state, AnalysisState::Failed);
        assert!(db.list_alerts("tenant-1", None, 10).await.unwrap().is_empty());
    }

    /// Delegates to a real backend but always reports no existing alert,
    /// standing in for a concurrent analyzer that inserted one between
    /// the exists-check and the write.
    struct StaleExistsBackend(Arc<dyn DatabaseBackend>);

    #[async_trait::async_trait]
    impl crate::db::ExecutionStore for StaleExistsBackend {
        async fn create_execution(&self, execution: &SearchExecution) -> Result<()> {
            self.0.create_execution(execution).await
        }
        async fn get_execution(&self, id: &str) -> Result<Option<SearchExecution>> {
            self.0.get_execution(id).await
        }
        async fn latest_execution(&self, search_id: &str) -> Result<Option<SearchExecution>> {
            self.0.latest_execution(search_id).await
        }
        async fn set_analysis_state(&self, id: &str, state: AnalysisState) -> Result<()> {
            self.0.set_analysis_state(id, state).await
        }
        async fn max_terminal_seq(&self, search_id: &str) -> Result<Option<i64>> {
            self.0.max_terminal_seq(search_id).await
        }
        async fn next_seq(&self, search_id: &str) -> Result<i64> {
            self.0.next_seq(search_id).await
        }
    }

    #[async_trait::async_trait]
    impl crate::db::PageStore for StaleExistsBackend {
        async fn put_page(&self, page: &crate::models::WebPageDocument) -> Result<()> {
            self.0.put_page(page).await
        }
        async fn query_recent(
            &self,
            tenant_id: &str,
            project_id: &str,
            source_query: &str,
            since: chrono::DateTime<Utc>,
            now: chrono::DateTime<Utc>,
        ) -> Result<Vec<crate::models::WebPageDocument>> {
            self.0
                .query_recent(tenant_id, project_id, source_query, since, now)
                .await
        }
        async fn sweep_expired(&self, now: chrono::DateTime<Utc>) -> Result<u64> {
            self.0.sweep_expired(now).await
        }
    }

    #[async_trait::async_trait]
    impl crate::db::RecurringSearchStore for StaleExistsBackend {
        async fn create_recurring(&self, config: &RecurringSearchConfig) -> Result<()> {
            self.0.create_recurring(config).await
        }
        async fn get_recurring(&self, search_id: &str) -> Result<Option<RecurringSearchConfig>> {
            self.0.get_recurring(search_id).await
        }
        async fn update_recurring(&self, config: &RecurringSearchConfig) -> Result<()> {
            self.0.update_recurring(config).await
        }
        async fn delete_recurring(&self, search_id: &str) -> Result<bool> {
            self.0.delete_recurring(search_id).await
        }
        async fn list_recurring(&self, tenant_id: &str) -> Result<Vec<RecurringSearchConfig>> {
            self.0.list_recurring(tenant_id).await
        }
        async fn due_searches(
            &self,
            now: chrono::DateTime<Utc>,
        ) -> Result<Vec<RecurringSearchConfig>> {
            self.0.due_searches(now).await
        }
        async fn set_last_executed(&self, search_id: &str, at: chrono::DateTime<Utc>) -> Result<()> {
            self.0.set_last_executed(search_id, at).await
        }
        async fn set_recommended_sensitivity(
            &self,
            search_id: &str,
            sensitivity: crate::models::Sensitivity,
        ) -> Result<()> {
            self.0.set_recommended_sensitivity(search_id, sensitivity).await
        }
    }

    #[async_trait::async_trait]
    impl crate::db::AlertStore for StaleExistsBackend {
        async fn create_alert(&self, alert: &Alert) -> Result<()> {
            self.0.create_alert(alert).await
        }
        async fn alert_exists(&self, _search_id: &str, _execution_id: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
            self.0.get_alert(id).await
        }
        async fn list_alerts(
            &self,
            tenant_id: &str,
            search_id: Option<&str>,
            limit: u32,
        ) -> Result<Vec<Alert>> {
            self.0.list_alerts(tenant_id, search_id, limit).await
        }
        async fn update_alert_status(
            &self,
            id: &str,
            status: AlertStatus,
            snooze_until: Option<chrono::DateTime<Utc>>,
        ) -> Result<()> {
            self.0.update_alert_status(id, status, snooze_until).await
        }
        async fn set_alert_feedback(
            &self,
            id: &str,
            feedback: FeedbackKind,
            comment: Option<&str>,
        ) -> Result<()> {
            self.0.set_alert_feedback(id, feedback, comment).await
        }
        async fn update_alert_notifications(
            &self,
            id: &str,
            notifications: &[crate::models::NotificationRecord],
        ) -> Result<()> {
            self.0.update_alert_notifications(id, notifications).await
        }
        async fn latest_alert_feedback(&self, search_id: &str) -> Result<Option<FeedbackKind>> {
            self.0.latest_alert_feedback(search_id).await
        }
        async fn recent_irrelevant_alerts(
            &self,
            search_id: &str,
            limit: u32,
        ) -> Result<Vec<Alert>> {
            self.0.recent_irrelevant_alerts(search_id, limit).await
        }
    }

    #[async_trait::async_trait]
    impl crate::db::SuppressionStore for StaleExistsBackend {
        async fn create_rule(&self, rule: &SuppressionRule) -> Result<()> {
            self.0.create_rule(rule).await
        }
        async fn active_rules(&self, search_id: &str) -> Result<Vec<SuppressionRule>> {
            self.0.active_rules(search_id).await
        }
        async fn soft_delete_rule(&self, id: &str) -> Result<bool> {
            self.0.soft_delete_rule(id).await
        }
        async fn bump_applied_count(&self, id: &str) -> Result<()> {
            self.0.bump_applied_count(id).await
        }
    }

    #[async_trait::async_trait]
    impl crate::db::FeedbackStore for StaleExistsBackend {
        async fn append_feedback(&self, feedback: &crate::models::AlertFeedback) -> Result<()> {
            self.0.append_feedback(feedback).await
        }
        async fn feedback_count(&self, search_id: &str) -> Result<i64> {
            self.0.feedback_count(search_id).await
        }
        async fn recent_feedback(
            &self,
            search_id: &str,
            limit: u32,
        ) -> Result<Vec<crate::models::AlertFeedback>> {
            self.0.recent_feedback(search_id, limit).await
        }
    }

    #[tokio::test]
    async fn losing_the_create_race_is_treated_as_already_alerted() {
        let server = MockServer::start().await;
        mock_llm(&server, true, 0.9).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 10))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 14))
            .await
            .unwrap();

        // The concurrent run's alert already landed.
        db.create_alert(&Alert {
            id: "alrt_other".to_string(),
            search_id: "srch_a".to_string(),
            tenant_id: "tenant-1".to_string(),
            execution_id: "exec_2".to_string(),
            triggered_at: Utc::now(),
            confidence: 0.9,
            summary: "earlier run".to_string(),
            key_changes: vec![],
            reasoning: String::new(),
            citations: vec![],
            status: AlertStatus::Unread,
            feedback: None,
            feedback_comment: None,
            snooze_until: None,
            notifications: Vec::new(),
        })
        .await
        .unwrap();

        let racing: Arc<dyn DatabaseBackend> = Arc::new(StaleExistsBackend(Arc::clone(&db)));
        let analyzer = analyzer(racing, llm_against(&server));
        let outcome = analyzer.analyze("exec_2").await.unwrap();
        assert_eq!(outcome, AnalysisOutcome::AlreadyAlerted);

        let stored = db.get_execution("exec_2").await.unwrap().unwrap();
        assert_eq!(stored.analysis_state, AnalysisState::Alerted);
        let alerts = db.list_alerts("tenant-1", Some("srch_a"), 10).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "alrt_other");
    }

    #[tokio::test]
    async fn volume_gate_blocks_small_deltas() {
        let server = MockServer::start().await;
        mock_llm(&server, true, 0.95).await;

        let db = backend().await;
        seed_search(&db, "srch_a").await;
        // 100 -> 101: neither 3 items nor 20%.
        db.create_execution(&execution("exec_1", "srch_a", 1, None, 100))
            .await
            .unwrap();
        db.create_execution(&execution("exec_2", "srch_a", 2, Some("exec_1"), 101))
            .await
            .unwrap();

        let analyzer = analyzer(Arc::clone(&db), llm_against(&server));
        assert_eq!(
            analyzer.analyze("exec_2").await.unwrap(),
            AnalysisOutcome::NoChange
        );
    }
}
