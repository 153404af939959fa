use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, VigilError};
use crate::models::{SearchResult, SearchType};

/// Per-request knobs passed down from the caller.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub max_results: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { max_results: 10 }
    }
}

/// A single upstream search backend. Implementations normalize whatever
/// wire format the backend speaks into `SearchResult` values.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        params: SearchParams,
    ) -> Result<Vec<SearchResult>>;
}

/// Provider speaking the SearXNG-compatible JSON search API
/// (`GET /search?q=...&format=json`).
pub struct HttpSearchProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    score: Option<f64>,
    engine: Option<String>,
}

impl HttpSearchProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn categories_for(search_type: SearchType) -> &'static str {
        match search_type {
            SearchType::General => "general",
            SearchType::News => "news",
            SearchType::Finance => "news,general",
        }
    }
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

fn parse_published(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        params: SearchParams,
    ) -> Result<Vec<SearchResult>> {
        let url = format!("{}/search", self.base_url);
        let mut request = self.client.get(&url).query(&[
            ("q", query),
            ("format", "json"),
            ("categories", Self::categories_for(search_type)),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(VigilError::ProviderQuota {
                provider: self.name.clone(),
                retry_after,
            });
        }

        let response = response.error_for_status()?;
        let body: WireResponse = response.json().await?;

        let results = body
            .results
            .into_iter()
            .take(params.max_results)
            .map(|r| {
                let source = r.engine.filter(|e| !e.is_empty()).unwrap_or_else(|| domain_of(&r.url));
                SearchResult {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                    source,
                    published_at: parse_published(r.published_date.as_deref()),
                    relevance_score: r.score.unwrap_or(0.0) as f32,
                }
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn domain_strips_www() {
        assert_eq!(domain_of("https://www.example.com/a/b"), "example.com");
        assert_eq!(domain_of("https://news.ycombinator.com/item"), "news.ycombinator.com");
        assert_eq!(domain_of("not a url"), "");
    }

    #[test]
    fn published_date_accepts_rfc3339_and_plain_date() {
        assert!(parse_published(Some("2026-03-01T12:00:00Z")).is_some());
        assert!(parse_published(Some("2026-03-01")).is_some());
        assert!(parse_published(Some("yesterday")).is_none());
        assert!(parse_published(None).is_none());
    }

    #[test]
    fn finance_maps_to_news_and_general() {
        assert_eq!(HttpSearchProvider::categories_for(SearchType::Finance), "news,general");
        assert_eq!(HttpSearchProvider::categories_for(SearchType::News), "news");
    }
}
