use serde::{Deserialize, Serialize};

/// Advisory progress events published on the event bus while background
/// work runs. At-least-once, unordered; consumers must tolerate
/// duplicates and drops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    SearchStarted {
        search_id: String,
        execution_id: String,
        query: String,
    },
    SearchResults {
        search_id: String,
        execution_id: String,
        result_count: usize,
    },
    ScrapingProgress {
        search_id: String,
        execution_id: String,
        page: usize,
        url: String,
        status: PageStatus,
        chunks_created: usize,
    },
    ScrapingComplete {
        search_id: String,
        execution_id: String,
        page_count: usize,
        failed_count: usize,
    },
    LearningUpdate {
        search_id: String,
        detail: String,
    },
}

impl ProgressEvent {
    pub fn search_id(&self) -> &str {
        match self {
            Self::SearchStarted { search_id, .. }
            | Self::SearchResults { search_id, .. }
            | Self::ScrapingProgress { search_id, .. }
            | Self::ScrapingComplete { search_id, .. }
            | Self::LearningUpdate { search_id, .. } => search_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Started,
    Completed,
    Failed,
}
