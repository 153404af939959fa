//! End-to-end pipeline test: trigger a recurring search against mocked
//! upstreams and follow it through scraping, embedding, delta analysis,
//! alert creation, and webhook delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vigil::analysis::DeltaAnalyzer;
use vigil::config::{AnalysisConfig, DatabaseConfig, LlmConfig, ProcessingConfig, ScraperConfig};
use vigil::db::{Database, DatabaseBackend, LibSqlBackend};
use vigil::embeddings::Embedder;
use vigil::error::Result;
use vigil::llm::LlmProvider;
use vigil::models::{AnalysisState, ProgressEvent, RecurringSearchConfig, SearchType};
use vigil::processing::ContentChunker;
use vigil::scrape::WebScraper;
use vigil::search::{HttpSearchProvider, SearchGateway};
use vigil::services::{
    AlertDispatcher, DeepSearchOrchestrator, SearchService, WebhookChannel,
};

struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_passages(&self, texts: Vec<String>) -> Result<Vec<Option<Vec<f32>>>> {
        Ok(texts.into_iter().map(|_| Some(vec![0.1; 8])).collect())
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.1; 8])
    }

    fn dimensions(&self) -> usize {
        8
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

/// Mounts a SearXNG-style results page pointing back at `page_server`.
async fn mock_provider(server: &MockServer, page_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "title": "Acme acquisition confirmed",
                    "url": format!("{}/story", page_server.uri()),
                    "content": "Acme confirmed the deal in a filing",
                    "engine": "news"
                },
                {
                    "title": "Analysts react to Acme deal",
                    "url": format!("{}/reaction", page_server.uri()),
                    "content": "Market reaction to the acquisition",
                    "engine": "news"
                }
            ]
        })))
        .mount(server)
        .await;
}

async fn mock_pages(server: &MockServer) {
    let html = "<html><head><title>Acme deal</title></head>\
                <body><article><p>Acme confirmed the acquisition of Widget Co \
                in a regulatory filing published this morning. The deal is \
                valued at two billion dollars.</p></article></body></html>";
    for route in ["/story", "/reaction"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string(html),
            )
            .mount(server)
            .await;
    }
}

async fn mock_llm(server: &MockServer) {
    let content = json!({
        "is_significant": true,
        "confidence": 0.92,
        "summary": "Acme confirmed the acquisition in a regulatory filing",
        "key_changes": ["Deal confirmed"],
        "reasoning": "Previously a rumor, now confirmed",
        "citations": ["https://news.example/story"]
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })))
        .mount(server)
        .await;
}

fn build_service(
    db: Arc<dyn DatabaseBackend>,
    provider_server: &MockServer,
    llm_server: &MockServer,
    webhook_url: Option<String>,
    events: broadcast::Sender<ProgressEvent>,
) -> Arc<SearchService> {
    let provider = Arc::new(
        HttpSearchProvider::new(
            "mock",
            provider_server.uri(),
            None,
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let gateway = Arc::new(SearchGateway::with_providers(
        vec![provider.clone()],
        vec![provider.clone()],
        vec![provider],
        Duration::from_secs(2),
    ));

    let processing = ProcessingConfig {
        chunk_token_limit: 64,
        deep_search_pages: 2,
        deep_search_pages_max: 5,
        deep_search_concurrency: 2,
        page_ttl_days: 30,
        sweep_interval_secs: 3600,
    };
    let scraper = Arc::new(
        WebScraper::new(&ScraperConfig {
            timeout_secs: 2,
            max_body_bytes: 1024 * 1024,
            user_agent: "vigil-test".to_string(),
        })
        .unwrap(),
    );
    let chunker = Arc::new(ContentChunker::new(&processing));
    let orchestrator = Arc::new(DeepSearchOrchestrator::new(
        db.clone(),
        scraper,
        chunker,
        Arc::new(StubEmbedder),
        events.clone(),
        &processing,
    ));

    let llm = LlmProvider::new(Some(&LlmConfig {
        model: "custom/test-model".to_string(),
        api_key: Some("test".to_string()),
        base_url: Some(llm_server.uri()),
        timeout_secs: 5,
        max_retries: 0,
    }));
    let analyzer = Arc::new(DeltaAnalyzer::new(
        db.clone(),
        llm,
        AnalysisConfig {
            confidence_threshold: 0.70,
            volume_threshold: 3,
            volume_threshold_percent: 20.0,
            comparison_timeout_secs: 5,
        },
        20,
    ));

    let channels: Vec<Arc<dyn vigil::services::NotificationChannel>> = match webhook_url {
        Some(url) => vec![Arc::new(
            WebhookChannel::new("ops", url, Duration::from_secs(2)).unwrap(),
        )],
        None => vec![],
    };
    let dispatcher = Arc::new(AlertDispatcher::new(db.clone(), channels));

    Arc::new(SearchService::new(
        db,
        gateway,
        orchestrator,
        analyzer,
        dispatcher,
        events,
        10,
    ))
}

async fn seed_search(db: &Arc<dyn DatabaseBackend>, search_id: &str) {
    let mut search = RecurringSearchConfig::new(
        search_id.to_string(),
        "tenant-1".to_string(),
        "project-1".to_string(),
        "acme acquisition".to_string(),
        SearchType::News,
    );
    // The provider mock returns the same result count on every run, so
    // the absolute-volume gate must be open for the alert to fire.
    search.volume_threshold = Some(0);
    db.create_recurring(&search).await.unwrap();
}

async fn wait_for_terminal_state(
    db: &Arc<dyn DatabaseBackend>,
    execution_id: &str,
) -> AnalysisState {
    for _ in 0..100 {
        let execution = db.get_execution(execution_id).await.unwrap().unwrap();
        if execution.analysis_state.is_terminal() {
            return execution.analysis_state;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("execution {execution_id} never reached a terminal state");
}

#[tokio::test]
async fn full_pipeline_produces_alert_and_delivers_webhook() {
    let provider_server = MockServer::start().await;
    let page_server = MockServer::start().await;
    let llm_server = MockServer::start().await;
    let webhook_server = MockServer::start().await;

    mock_provider(&provider_server, &page_server).await;
    mock_pages(&page_server).await;
    mock_llm(&llm_server).await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook_server)
        .await;

    let db = backend().await;
    seed_search(&db, "srch_e2e").await;
    let (events, _rx) = broadcast::channel(64);
    let service = build_service(
        db.clone(),
        &provider_server,
        &llm_server,
        Some(format!("{}/hook", webhook_server.uri())),
        events,
    );

    // First run has nothing to compare against.
    let first = service.trigger("srch_e2e").await.unwrap();
    assert_eq!(first.results.len(), 2);
    let state = wait_for_terminal_state(&db, &first.execution_id).await;
    assert_eq!(state, AnalysisState::NoChange);

    // Second run sees a previous execution and the mocked comparison
    // reports a significant confirmed change.
    let second = service.trigger("srch_e2e").await.unwrap();
    let state = wait_for_terminal_state(&db, &second.execution_id).await;
    assert_eq!(state, AnalysisState::Alerted);

    let alerts = db.list_alerts("tenant-1", Some("srch_e2e"), 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.execution_id, second.execution_id);
    assert!(alert.summary.contains("regulatory filing"));

    // Webhook delivery is recorded on the alert.
    for _ in 0..100 {
        let alert = db.get_alert(&alert.id).await.unwrap().unwrap();
        if !alert.notifications.is_empty() {
            assert_eq!(alert.notifications[0].channel, "ops");
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("webhook delivery was never recorded");
}

#[tokio::test]
async fn scraped_pages_are_stored_with_embedded_chunks() {
    let provider_server = MockServer::start().await;
    let page_server = MockServer::start().await;
    let llm_server = MockServer::start().await;

    mock_provider(&provider_server, &page_server).await;
    mock_pages(&page_server).await;
    mock_llm(&llm_server).await;

    let db = backend().await;
    seed_search(&db, "srch_pages").await;
    let (events, _rx) = broadcast::channel(64);
    let service = build_service(db.clone(), &provider_server, &llm_server, None, events);

    let resp = service.trigger("srch_pages").await.unwrap();
    wait_for_terminal_state(&db, &resp.execution_id).await;

    let pages = db
        .query_recent(
            "tenant-1",
            "project-1",
            "acme acquisition",
            chrono::Utc::now() - chrono::Duration::hours(1),
            chrono::Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    for page in &pages {
        assert!(!page.chunks.is_empty());
        assert_eq!(page.chunks[0].embedding.len(), 8);
        assert!(page.content.contains("Widget Co"));
    }
}

#[tokio::test]
async fn progress_events_reach_subscribers() {
    let provider_server = MockServer::start().await;
    let page_server = MockServer::start().await;
    let llm_server = MockServer::start().await;

    mock_provider(&provider_server, &page_server).await;
    mock_pages(&page_server).await;
    mock_llm(&llm_server).await;

    let db = backend().await;
    seed_search(&db, "srch_events").await;
    let (events, mut rx) = broadcast::channel(64);
    let service = build_service(db.clone(), &provider_server, &llm_server, None, events);

    let resp = service.trigger("srch_events").await.unwrap();
    wait_for_terminal_state(&db, &resp.execution_id).await;

    let mut saw_started = false;
    let mut saw_complete = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            ProgressEvent::SearchStarted { search_id, .. } => {
                assert_eq!(search_id, "srch_events");
                saw_started = true;
            }
            ProgressEvent::ScrapingComplete {
                page_count,
                failed_count,
                ..
            } => {
                assert_eq!(page_count, 2);
                assert_eq!(failed_count, 0);
                saw_complete = true;
            }
            _ => {}
        }
    }
    assert!(saw_started);
    assert!(saw_complete);
}
