use std::sync::Arc;

use nanoid::nanoid;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ProcessingConfig;
use crate::db::DatabaseBackend;
use crate::embeddings::Embedder;
use crate::error::{Result, VigilError};
use crate::models::{
    AnalysisState, PageChunk, PageStatus, ProgressEvent, SearchExecution, WebPageDocument,
};
use crate::processing::ContentChunker;
use crate::scrape::WebScraper;

/// What one deep-search batch accomplished. Page failures are tolerated;
/// only infrastructure errors fail the batch itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepSearchReport {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Scrapes the top results of an execution, chunks and embeds their
/// content, and stores the pages. Runs detached from the triggering
/// request with a bounded worker pool.
pub struct DeepSearchOrchestrator {
    db: Arc<dyn DatabaseBackend>,
    scraper: Arc<WebScraper>,
    chunker: Arc<ContentChunker>,
    embedder: Arc<dyn Embedder>,
    events: broadcast::Sender<ProgressEvent>,
    max_pages: usize,
    concurrency: usize,
    ttl_days: i64,
}

enum PageOutcome {
    Completed,
    Failed,
    Skipped,
}

impl DeepSearchOrchestrator {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        scraper: Arc<WebScraper>,
        chunker: Arc<ContentChunker>,
        embedder: Arc<dyn Embedder>,
        events: broadcast::Sender<ProgressEvent>,
        config: &ProcessingConfig,
    ) -> Self {
        Self {
            db,
            scraper,
            chunker,
            embedder,
            events,
            max_pages: config.deep_search_pages.clamp(1, config.deep_search_pages_max),
            concurrency: config.deep_search_concurrency.max(1),
            ttl_days: config.page_ttl_days,
        }
    }

    /// Process one execution's top results. In-flight pages drain on
    /// cancellation, queued pages never start, and a cancelled execution
    /// is marked so delta analysis will not run for it.
    pub async fn run(
        &self,
        execution: &SearchExecution,
        cancel: CancellationToken,
    ) -> Result<DeepSearchReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<PageOutcome> = JoinSet::new();

        for (index, result) in execution.results.iter().take(self.max_pages).enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let db = Arc::clone(&self.db);
            let scraper = Arc::clone(&self.scraper);
            let chunker = Arc::clone(&self.chunker);
            let embedder = Arc::clone(&self.embedder);
            let events = self.events.clone();
            let execution = execution.clone();
            let url = result.url.clone();
            let ttl_days = self.ttl_days;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return PageOutcome::Skipped;
                };
                if cancel.is_cancelled() {
                    return PageOutcome::Skipped;
                }

                let _ = events.send(ProgressEvent::ScrapingProgress {
                    search_id: execution.search_id.clone(),
                    execution_id: execution.id.clone(),
                    page: index + 1,
                    url: url.clone(),
                    status: PageStatus::Started,
                    chunks_created: 0,
                });

                match process_page(&db, &scraper, &chunker, embedder.as_ref(), &execution, &url, ttl_days)
                    .await
                {
                    Ok(chunk_count) => {
                        let _ = events.send(ProgressEvent::ScrapingProgress {
                            search_id: execution.search_id.clone(),
                            execution_id: execution.id.clone(),
                            page: index + 1,
                            url,
                            status: PageStatus::Completed,
                            chunks_created: chunk_count,
                        });
                        PageOutcome::Completed
                    }
                    Err(err) => {
                        warn!(url = %url, error = %err, "Page processing failed, skipping");
                        let _ = events.send(ProgressEvent::ScrapingProgress {
                            search_id: execution.search_id.clone(),
                            execution_id: execution.id.clone(),
                            page: index + 1,
                            url,
                            status: PageStatus::Failed,
                            chunks_created: 0,
                        });
                        PageOutcome::Failed
                    }
                }
            });
        }

        let mut completed = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(PageOutcome::Completed) => completed += 1,
                Ok(PageOutcome::Failed) => failed += 1,
                Ok(PageOutcome::Skipped) => {}
                Err(err) => {
                    warn!(error = %err, "Page task panicked");
                    failed += 1;
                }
            }
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            info!(
                execution_id = %execution.id,
                "Deep search cancelled, marking execution"
            );
            self.db
                .set_analysis_state(&execution.id, AnalysisState::Cancelled)
                .await?;
        }

        let _ = self.events.send(ProgressEvent::ScrapingComplete {
            search_id: execution.search_id.clone(),
            execution_id: execution.id.clone(),
            page_count: completed,
            failed_count: failed,
        });

        Ok(DeepSearchReport {
            completed,
            failed,
            cancelled,
        })
    }
}

async fn process_page(
    db: &Arc<dyn DatabaseBackend>,
    scraper: &WebScraper,
    chunker: &ContentChunker,
    embedder: &dyn Embedder,
    execution: &SearchExecution,
    url: &str,
    ttl_days: i64,
) -> Result<usize> {
    let scraped = scraper.scrape(url).await?;
    let chunks = chunker.chunk(&scraped.text);

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let total = texts.len();
    let embeddings = embedder.embed_passages(texts).await?;

    // A chunk still missing its embedding after the per-item retry fails
    // the whole page; storing a partially indexed page would make it
    // invisible to semantic lookups over the missing content.
    let mut page_chunks: Vec<PageChunk> = Vec::with_capacity(total);
    let mut missing = 0usize;
    for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
        match embedding {
            Some(embedding) => page_chunks.push(PageChunk {
                text: chunk.text,
                embedding,
                start_index: chunk.start_index,
            }),
            None => missing += 1,
        }
    }
    if missing > 0 {
        return Err(VigilError::EmbeddingFailed {
            url: url.to_string(),
            reason: format!("{missing} of {total} chunks could not be embedded"),
        });
    }
    let chunk_count = page_chunks.len();

    let mut page = WebPageDocument::new(
        format!("page_{}", nanoid!()),
        execution.tenant_id.clone(),
        execution.project_id.clone(),
        execution.query.clone(),
        url.to_string(),
        execution.search_type,
        ttl_days,
    );
    page.content = scraped.text;
    page.title = scraped.title;
    page.author = scraped.author;
    page.publish_date = scraped.published_at;
    page.recurring_search_id = Some(execution.search_id.clone());
    page.chunks = page_chunks;

    db.put_page(&page).await?;
    Ok(chunk_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ScraperConfig};
    use crate::db::{Database, LibSqlBackend};
    use crate::models::{SearchResult, SearchType};
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_passages(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
            Ok(texts.iter().map(|t| Some(vec![t.len() as f32, 1.0])).collect())
        }

        async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
            Ok(vec![query.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        async fn embed_passages(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
            Ok(texts.iter().map(|_| None).collect())
        }

        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>> {
            Err(crate::error::VigilError::Embedding("down".to_string()))
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

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

    fn orchestrator(
        db: Arc<dyn DatabaseBackend>,
        events: broadcast::Sender<ProgressEvent>,
    ) -> DeepSearchOrchestrator {
        orchestrator_with(db, events, Arc::new(StubEmbedder))
    }

    fn orchestrator_with(
        db: Arc<dyn DatabaseBackend>,
        events: broadcast::Sender<ProgressEvent>,
        embedder: Arc<dyn Embedder>,
    ) -> DeepSearchOrchestrator {
        let config = ProcessingConfig {
            chunk_token_limit: 64,
            deep_search_pages: 3,
            deep_search_pages_max: 5,
            deep_search_concurrency: 3,
            page_ttl_days: 30,
            sweep_interval_secs: 3600,
        };
        let scraper = WebScraper::new(&ScraperConfig {
            timeout_secs: 2,
            max_body_bytes: 1024 * 1024,
            user_agent: "vigil-test/0.1".to_string(),
        })
        .unwrap();
        DeepSearchOrchestrator::new(
            db,
            Arc::new(scraper),
            Arc::new(ContentChunker::new(&config)),
            embedder,
            events,
            &config,
        )
    }

    fn execution_with_urls(urls: Vec<String>) -> SearchExecution {
        SearchExecution {
            id: "exec_1".to_string(),
            tenant_id: "tenant-1".to_string(),
            project_id: "project-1".to_string(),
            search_id: "srch_1".to_string(),
            query: "acme".to_string(),
            search_type: SearchType::News,
            executed_at: Utc::now(),
            results: urls
                .into_iter()
                .map(|url| SearchResult {
                    title: "t".to_string(),
                    url,
                    snippet: "s".to_string(),
                    source: "example".to_string(),
                    published_at: None,
                    relevance_score: 0.5,
                })
                .collect(),
            previous_execution_id: None,
            seq: 1,
            analysis_state: AnalysisState::Pending,
        }
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html")
            .set_body_string(format!("<html><body><article>{body}</article></body></html>"))
    }

    #[tokio::test]
    async fn one_failing_page_does_not_sink_the_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok1"))
            .respond_with(html_page("First page talks about the deal."))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok2"))
            .respond_with(html_page("Second page has more detail."))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let db = backend().await;
        let (events, mut rx) = broadcast::channel(64);
        let orchestrator = orchestrator(Arc::clone(&db), events);

        let execution = execution_with_urls(vec![
            format!("{}/ok1", server.uri()),
            format!("{}/broken", server.uri()),
            format!("{}/ok2", server.uri()),
        ]);
        db.create_execution(&execution).await.unwrap();

        let report = orchestrator
            .run(&execution, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.cancelled);

        let pages = db
            .query_recent(
                "tenant-1",
                "project-1",
                "acme",
                Utc::now() - chrono::Duration::hours(1),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| !p.chunks.is_empty()));

        let mut saw_failed = false;
        let mut saw_complete = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ProgressEvent::ScrapingProgress {
                    status: PageStatus::Failed,
                    ..
                } => saw_failed = true,
                ProgressEvent::ScrapingComplete {
                    page_count,
                    failed_count,
                    ..
                } => {
                    saw_complete = true;
                    assert_eq!(page_count, 2);
                    assert_eq!(failed_count, 1);
                }
                _ => {}
            }
        }
        assert!(saw_failed && saw_complete);
    }

    #[tokio::test]
    async fn page_with_unembeddable_chunks_is_dropped_not_stored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/story"))
            .respond_with(html_page("The deal closed yesterday."))
            .mount(&server)
            .await;

        let db = backend().await;
        let (events, mut rx) = broadcast::channel(64);
        let orchestrator = orchestrator_with(Arc::clone(&db), events, Arc::new(BrokenEmbedder));

        let execution = execution_with_urls(vec![format!("{}/story", server.uri())]);
        db.create_execution(&execution).await.unwrap();

        let report = orchestrator
            .run(&execution, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);

        let pages = db
            .query_recent(
                "tenant-1",
                "project-1",
                "acme",
                Utc::now() - chrono::Duration::hours(1),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(pages.is_empty());

        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::ScrapingProgress {
                status: PageStatus::Failed,
                ..
            } = event
            {
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test]
    async fn result_list_is_clamped_to_max_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(html_page("Page content here."))
            .mount(&server)
            .await;

        let db = backend().await;
        let (events, _rx) = broadcast::channel(64);
        let orchestrator = orchestrator(Arc::clone(&db), events);

        let urls = (0..8).map(|i| format!("{}/p{i}", server.uri())).collect();
        let execution = execution_with_urls(urls);
        db.create_execution(&execution).await.unwrap();

        let report = orchestrator
            .run(&execution, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.completed, 3);
    }

    #[tokio::test]
    async fn pre_cancelled_batch_starts_nothing_and_marks_execution() {
        let db = backend().await;
        let (events, _rx) = broadcast::channel(64);
        let orchestrator = orchestrator(Arc::clone(&db), events);

        let execution = execution_with_urls(vec!["http://127.0.0.1:9/unreachable".to_string()]);
        db.create_execution(&execution).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = orchestrator.run(&execution, cancel).await.unwrap();
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 0);
        assert!(report.cancelled);

        let stored = db.get_execution("exec_1").await.unwrap().unwrap();
        assert_eq!(stored.analysis_state, AnalysisState::Cancelled);
    }
}
