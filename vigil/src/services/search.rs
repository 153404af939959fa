use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use nanoid::nanoid;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::analysis::{AnalysisOutcome, DeltaAnalyzer};
use crate::db::DatabaseBackend;
use crate::error::{Result, VigilError};
use crate::models::{AnalysisState, ProgressEvent, SearchExecution, SearchResult};
use crate::search::{SearchGateway, SearchParams};
use crate::services::deep_search::DeepSearchOrchestrator;
use crate::services::dispatch::AlertDispatcher;

/// What the trigger endpoint returns: immediate results, while scraping
/// and analysis continue in the background.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerResponse {
    pub search_id: String,
    pub execution_id: String,
    pub results: Vec<SearchResult>,
}

/// Front door for executing a recurring search: gateway call, execution
/// record, then a detached deep-search + delta-analysis pipeline.
pub struct SearchService {
    db: Arc<dyn DatabaseBackend>,
    gateway: Arc<SearchGateway>,
    orchestrator: Arc<DeepSearchOrchestrator>,
    analyzer: Arc<DeltaAnalyzer>,
    dispatcher: Arc<AlertDispatcher>,
    events: broadcast::Sender<ProgressEvent>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
    max_results: usize,
}

impl SearchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        gateway: Arc<SearchGateway>,
        orchestrator: Arc<DeepSearchOrchestrator>,
        analyzer: Arc<DeltaAnalyzer>,
        dispatcher: Arc<AlertDispatcher>,
        events: broadcast::Sender<ProgressEvent>,
        max_results: usize,
    ) -> Self {
        Self {
            db,
            gateway,
            orchestrator,
            analyzer,
            dispatcher,
            events,
            cancellations: Mutex::new(HashMap::new()),
            max_results,
        }
    }

    /// Execute a recurring search now. Returns once the provider results
    /// are persisted; scraping and analysis are already detached.
    pub async fn trigger(self: &Arc<Self>, search_id: &str) -> Result<TriggerResponse> {
        let search = self
            .db
            .get_recurring(search_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("search {search_id}")))?;

        let execution_id = format!("exec_{}", nanoid!());
        let _ = self.events.send(ProgressEvent::SearchStarted {
            search_id: search_id.to_string(),
            execution_id: execution_id.clone(),
            query: search.query.clone(),
        });

        let results = self
            .gateway
            .search(
                &search.query,
                search.search_type,
                SearchParams {
                    max_results: self.max_results,
                },
            )
            .await?;

        let previous = self.db.latest_execution(search_id).await?;
        let seq = self.db.next_seq(search_id).await?;

        let execution = SearchExecution {
            id: execution_id.clone(),
            tenant_id: search.tenant_id.clone(),
            project_id: search.project_id.clone(),
            search_id: search_id.to_string(),
            query: search.query.clone(),
            search_type: search.search_type,
            executed_at: Utc::now(),
            results: results.clone(),
            previous_execution_id: previous.map(|p| p.id),
            seq,
            analysis_state: AnalysisState::Pending,
        };
        self.db.create_execution(&execution).await?;
        self.db.set_last_executed(search_id, execution.executed_at).await?;

        let _ = self.events.send(ProgressEvent::SearchResults {
            search_id: search_id.to_string(),
            execution_id: execution_id.clone(),
            result_count: results.len(),
        });

        let cancel = self.register_cancellation(search_id);
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_pipeline(execution, cancel).await;
        });

        info!(search_id, execution_id, result_count = results.len(), "Search triggered");

        Ok(TriggerResponse {
            search_id: search_id.to_string(),
            execution_id,
            results,
        })
    }

    /// Cancel the in-flight pipeline for a search, if any. Running page
    /// scrapes drain; no analysis follows.
    pub fn cancel(&self, search_id: &str) -> bool {
        let Ok(registry) = self.cancellations.lock() else {
            return false;
        };
        match registry.get(search_id) {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    fn register_cancellation(&self, search_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut registry) = self.cancellations.lock() {
            registry.insert(search_id.to_string(), token.clone());
        }
        token
    }

    async fn run_pipeline(&self, execution: SearchExecution, cancel: CancellationToken) {
        let report = match self.orchestrator.run(&execution, cancel.clone()).await {
            Ok(report) => report,
            Err(err) => {
                error!(execution_id = %execution.id, error = %err, "Deep search batch failed");
                return;
            }
        };

        if report.cancelled {
            return;
        }

        match self.analyzer.analyze(&execution.id).await {
            Ok(AnalysisOutcome::Alerted { alert_id }) => {
                match self.db.get_alert(&alert_id).await {
                    Ok(Some(alert)) => {
                        if let Err(err) = self.dispatcher.dispatch(&alert).await {
                            error!(alert_id = %alert.id, error = %err, "Alert dispatch failed");
                        }
                    }
                    Ok(None) => error!(alert_id, "Alert vanished before dispatch"),
                    Err(err) => error!(alert_id, error = %err, "Failed to load alert for dispatch"),
                }
            }
            Ok(outcome) => {
                info!(execution_id = %execution.id, ?outcome, "Delta analysis finished");
            }
            Err(err) => {
                error!(execution_id = %execution.id, error = %err, "Delta analysis errored");
            }
        }
    }
}
