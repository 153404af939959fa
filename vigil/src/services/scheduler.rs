use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::db::DatabaseBackend;
use crate::error::Result;
use crate::services::search::SearchService;

/// Drives scheduled recurring searches through the same path as the
/// trigger API. A search is due when its interval has elapsed since its
/// last execution; searches without an interval only run on demand.
#[derive(Clone)]
pub struct SearchScheduler {
    db: Arc<dyn DatabaseBackend>,
    service: Arc<SearchService>,
    tick_secs: u64,
}

impl SearchScheduler {
    pub fn new(db: Arc<dyn DatabaseBackend>, service: Arc<SearchService>, tick_secs: u64) -> Self {
        Self {
            db,
            service,
            tick_secs,
        }
    }

    /// One scheduler tick. A failing search does not block the rest.
    pub async fn run_once(&self) -> Result<usize> {
        let due = self.db.due_searches(Utc::now()).await?;
        if due.is_empty() {
            debug!("No recurring searches due");
            return Ok(0);
        }

        let mut triggered = 0;
        for search in due {
            match self.service.trigger(&search.search_id).await {
                Ok(response) => {
                    info!(
                        search_id = %search.search_id,
                        execution_id = %response.execution_id,
                        "Scheduled search triggered"
                    );
                    triggered += 1;
                }
                Err(err) => {
                    error!(
                        search_id = %search.search_id,
                        error = %err,
                        "Scheduled search failed"
                    );
                }
            }
        }

        Ok(triggered)
    }

    pub fn interval_secs(&self) -> u64 {
        self.tick_secs
    }
}
