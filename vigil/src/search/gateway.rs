use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::{Result, VigilError};
use crate::models::{SearchResult, SearchType};
use crate::search::provider::{HttpSearchProvider, SearchParams, SearchProvider};

/// Fans a query out to an ordered list of providers for the requested
/// search type, falling through to the next provider on timeout or error.
pub struct SearchGateway {
    general: Vec<Arc<dyn SearchProvider>>,
    news: Vec<Arc<dyn SearchProvider>>,
    finance: Vec<Arc<dyn SearchProvider>>,
    provider_timeout: Duration,
}

impl SearchGateway {
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let provider_timeout = Duration::from_secs(config.provider_timeout_secs);
        let build = |entries: &[crate::config::ProviderEntry]| -> Result<Vec<Arc<dyn SearchProvider>>> {
            entries
                .iter()
                .map(|entry| {
                    let provider = HttpSearchProvider::new(
                        entry.name.clone(),
                        entry.base_url.clone(),
                        entry.api_key.clone(),
                        provider_timeout,
                    )?;
                    Ok(Arc::new(provider) as Arc<dyn SearchProvider>)
                })
                .collect()
        };

        Ok(Self {
            general: build(config.providers_for(SearchType::General))?,
            news: build(config.providers_for(SearchType::News))?,
            finance: build(config.providers_for(SearchType::Finance))?,
            provider_timeout,
        })
    }

    /// Construct a gateway from pre-built providers. Used by tests and
    /// anywhere the provider set is assembled by hand.
    pub fn with_providers(
        general: Vec<Arc<dyn SearchProvider>>,
        news: Vec<Arc<dyn SearchProvider>>,
        finance: Vec<Arc<dyn SearchProvider>>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            general,
            news,
            finance,
            provider_timeout,
        }
    }

    fn chain_for(&self, search_type: SearchType) -> &[Arc<dyn SearchProvider>] {
        match search_type {
            SearchType::General => &self.general,
            SearchType::News => &self.news,
            SearchType::Finance => &self.finance,
        }
    }

    /// Try each provider in order. The first success wins; a provider that
    /// errors, times out, or hits its quota is skipped with a warning.
    pub async fn search(
        &self,
        query: &str,
        search_type: SearchType,
        params: SearchParams,
    ) -> Result<Vec<SearchResult>> {
        let chain = self.chain_for(search_type);
        if chain.is_empty() {
            return Err(VigilError::ProviderExhausted {
                query: query.to_string(),
                detail: format!("no providers configured for type '{search_type}'"),
            });
        }

        let mut failures: Vec<String> = Vec::new();

        for provider in chain {
            let attempt =
                tokio::time::timeout(self.provider_timeout, provider.search(query, search_type, params)).await;

            match attempt {
                Ok(Ok(results)) => {
                    tracing::debug!(
                        provider = provider.name(),
                        count = results.len(),
                        "Search provider returned results"
                    );
                    return Ok(results);
                }
                Ok(Err(VigilError::ProviderQuota {
                    provider: name,
                    retry_after,
                })) => {
                    tracing::warn!(
                        provider = name,
                        retry_after = ?retry_after,
                        "Search provider quota exceeded, trying next"
                    );
                    failures.push(format!("{name}: quota exceeded"));
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "Search provider failed, trying next"
                    );
                    failures.push(format!("{}: {err}", provider.name()));
                }
                Err(_) => {
                    tracing::warn!(
                        provider = provider.name(),
                        timeout_secs = self.provider_timeout.as_secs(),
                        "Search provider timed out, trying next"
                    );
                    failures.push(format!("{}: timed out", provider.name()));
                }
            }
        }

        Err(VigilError::ProviderExhausted {
            query: query.to_string(),
            detail: failures.join("; "),
        })
    }
}
