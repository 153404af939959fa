use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::DatabaseBackend;
use crate::error::Result;

/// Physically deletes web pages past their TTL. Reads already filter on
/// `expires_at`, so the sweeper only reclaims storage; visibility never
/// depends on it having run.
#[derive(Clone)]
pub struct PageSweeper {
    db: Arc<dyn DatabaseBackend>,
    interval_secs: u64,
}

impl PageSweeper {
    pub fn new(db: Arc<dyn DatabaseBackend>, interval_secs: u64) -> Self {
        Self { db, interval_secs }
    }

    /// Run a single sweep pass. Returns the number of pages removed.
    pub async fn run_once(&self) -> Result<u64> {
        debug!("Starting page sweep");
        let removed = self.db.sweep_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "Swept expired pages");
        }
        Ok(removed)
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{Database, LibSqlBackend};
    use crate::models::{SearchType, WebPageDocument};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

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

    fn page(id: &str, ttl_days: i64) -> WebPageDocument {
        WebPageDocument::new(
            id.to_string(),
            "tenant-1".to_string(),
            "project-1".to_string(),
            "query".to_string(),
            format!("https://example.com/{id}"),
            SearchType::General,
            ttl_days,
        )
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_pages() {
        let db = backend().await;

        let mut expired = page("page_old", 30);
        expired.scraped_at = Utc::now() - Duration::days(40);
        expired.expires_at = Utc::now() - Duration::days(10);
        db.put_page(&expired).await.unwrap();
        db.put_page(&page("page_fresh", 30)).await.unwrap();

        let sweeper = PageSweeper::new(Arc::clone(&db), 3600);
        assert_eq!(sweeper.run_once().await.unwrap(), 1);
        // Second pass has nothing left to do.
        assert_eq!(sweeper.run_once().await.unwrap(), 0);
    }
}
