use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::SearchType;

/// A chunk of a scraped page together with its embedding and position
/// in the normalized page text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub start_index: usize,
}

/// A scraped result page, partitioned by `(tenant_id, project_id, source_query)`
/// and visible only until `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPageDocument {
    pub id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub source_query: String,
    pub url: String,
    pub content: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub search_type: SearchType,
    pub scraped_at: DateTime<Utc>,
    /// Always `scraped_at + ttl`; never extended after creation.
    pub expires_at: DateTime<Utc>,
    pub chunks: Vec<PageChunk>,
    pub conversation_id: Option<String>,
    pub recurring_search_id: Option<String>,
}

impl WebPageDocument {
    pub fn new(
        id: String,
        tenant_id: String,
        project_id: String,
        source_query: String,
        url: String,
        search_type: SearchType,
        ttl_days: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            tenant_id,
            project_id,
            source_query,
            url,
            content: String::new(),
            title: None,
            author: None,
            publish_date: None,
            search_type,
            scraped_at: now,
            expires_at: now + Duration::days(ttl_days),
            chunks: Vec::new(),
            conversation_id: None,
            recurring_search_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(ttl_days: i64) -> WebPageDocument {
        WebPageDocument::new(
            "pg1".into(),
            "t1".into(),
            "p1".into(),
            "rust news".into(),
            "https://example.org/a".into(),
            SearchType::News,
            ttl_days,
        )
    }

    #[test]
    fn test_expires_at_is_scraped_at_plus_ttl() {
        let p = page(30);
        assert_eq!(p.expires_at, p.scraped_at + Duration::days(30));
    }

    #[test]
    fn test_is_expired() {
        let p = page(30);
        assert!(!p.is_expired(Utc::now()));
        assert!(p.is_expired(p.scraped_at + Duration::days(31)));
    }
}
