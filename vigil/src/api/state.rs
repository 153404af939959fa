use std::sync::Arc;

use tokio::sync::broadcast;

use crate::analysis::DeltaAnalyzer;
use crate::config::Config;
use crate::db::DatabaseBackend;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::models::ProgressEvent;
use crate::processing::ContentChunker;
use crate::scrape::WebScraper;
use crate::search::SearchGateway;
use crate::services::{AlertDispatcher, DeepSearchOrchestrator, LearningEngine, SearchService};

/// Capacity of the progress event bus. Slow SSE consumers that fall
/// further behind than this see a lagged gap, not backpressure.
const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn DatabaseBackend>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: LlmProvider,
    pub search: Arc<SearchService>,
    pub learning: Arc<LearningEngine>,
    /// Progress event bus shared by the pipeline and SSE subscribers.
    pub events: broadcast::Sender<ProgressEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<dyn DatabaseBackend>,
        embedder: Arc<dyn Embedder>,
        llm: LlmProvider,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);

        let gateway = Arc::new(SearchGateway::from_config(&config.search)?);
        let scraper = Arc::new(WebScraper::new(&config.scraper)?);
        let chunker = Arc::new(ContentChunker::new(&config.processing));
        let orchestrator = Arc::new(DeepSearchOrchestrator::new(
            db.clone(),
            scraper,
            chunker,
            embedder.clone(),
            events.clone(),
            &config.processing,
        ));
        let analyzer = Arc::new(DeltaAnalyzer::new(
            db.clone(),
            llm.clone(),
            config.analysis.clone(),
            config.learning.fp_rate_window as u32,
        ));
        let dispatcher = Arc::new(AlertDispatcher::from_config(
            db.clone(),
            &config.notifications,
        )?);
        let search = Arc::new(SearchService::new(
            db.clone(),
            gateway,
            orchestrator,
            analyzer,
            dispatcher,
            events.clone(),
            config.search.max_results,
        ));
        let learning = Arc::new(LearningEngine::new(
            db.clone(),
            events.clone(),
            config.learning.clone(),
        ));

        Ok(Self {
            config,
            db,
            embedder,
            llm,
            search,
            learning,
            events,
        })
    }
}
