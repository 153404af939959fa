use serde::Deserialize;
use std::env;

use crate::models::SearchType;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Parse a provider list env var.
/// Format: comma-separated `name=base_url` pairs, e.g.
/// `searx=https://searx.example.org,brave=https://search.brave.example`.
/// Provider order in the list is the fallback order.
fn parse_provider_list(var: &str) -> Vec<ProviderEntry> {
    match env::var(var) {
        Ok(val) if !val.is_empty() => val
            .split(',')
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let name = parts.next()?.trim();
                let base_url = parts.next()?.trim();
                if name.is_empty() || base_url.is_empty() {
                    tracing::warn!("Invalid provider entry '{}' in {}, skipping", pair, var);
                    None
                } else {
                    let key_var = format!("SEARCH_API_KEY_{}", name.to_uppercase());
                    Some(ProviderEntry {
                        name: name.to_string(),
                        base_url: base_url.to_string(),
                        api_key: env::var(key_var).ok(),
                    })
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub scraper: ScraperConfig,
    pub processing: ProcessingConfig,
    pub embeddings: EmbeddingsConfig,
    pub analysis: AnalysisConfig,
    pub learning: LearningConfig,
    pub notifications: NotificationsConfig,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// An ordered entry in a provider fallback chain.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Fallback chains per search type, tried in order.
    pub general_providers: Vec<ProviderEntry>,
    pub news_providers: Vec<ProviderEntry>,
    pub finance_providers: Vec<ProviderEntry>,
    /// Per-provider call timeout. Worst case latency for a search is the
    /// sum of timeouts across the chain, never more.
    pub provider_timeout_secs: u64,
    pub max_results: usize,
}

impl SearchConfig {
    pub fn providers_for(&self, search_type: SearchType) -> &[ProviderEntry] {
        match search_type {
            SearchType::General => &self.general_providers,
            SearchType::News => &self.news_providers,
            SearchType::Finance => &self.finance_providers,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    pub timeout_secs: u64,
    pub max_body_bytes: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Token budget per chunk (estimated, chars/4).
    pub chunk_token_limit: usize,
    /// Pages scraped per deep search unless the request says otherwise.
    pub deep_search_pages: usize,
    /// Hard cap on pages per deep search.
    pub deep_search_pages_max: usize,
    /// Concurrent page fetches within one deep-search batch.
    pub deep_search_concurrency: usize,
    /// How long scraped pages stay queryable.
    pub page_ttl_days: i64,
    /// Interval between physical sweeps of expired pages.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
}

/// Tenant-level analysis defaults, overridable per recurring search.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub confidence_threshold: f32,
    pub volume_threshold: i64,
    pub volume_threshold_percent: f32,
    /// Timeout for a single LLM comparison call.
    pub comparison_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// Aggregation runs on every Nth feedback entry per search.
    pub feedback_batch_size: usize,
    /// Trailing window of feedback entries used for the FP rate.
    pub fp_rate_window: usize,
    /// Minimum irrelevant alerts sharing a characteristic before a rule
    /// is materialized.
    pub cluster_min: usize,
    /// Interval between scheduler ticks for recurring searches.
    pub schedule_tick_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Webhook endpoints notified on every alert, format `name=url` pairs.
    pub webhooks: Vec<(String, String)>,
    pub timeout_secs: u64,
}

/// LLM configuration for the comparison/completion models
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("VIGIL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("VIGIL_PORT", 3000),
                api_keys: env::var("VIGIL_API_KEYS")
                    .map(|keys| keys.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:vigil.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            search: SearchConfig {
                general_providers: parse_provider_list("SEARCH_PROVIDERS_GENERAL"),
                news_providers: parse_provider_list("SEARCH_PROVIDERS_NEWS"),
                finance_providers: parse_provider_list("SEARCH_PROVIDERS_FINANCE"),
                provider_timeout_secs: parse_env_or("SEARCH_PROVIDER_TIMEOUT", 10),
                max_results: parse_env_or("SEARCH_MAX_RESULTS", 20),
            },
            scraper: ScraperConfig {
                timeout_secs: parse_env_or("SCRAPER_TIMEOUT", 10),
                max_body_bytes: parse_env_or("SCRAPER_MAX_BODY_BYTES", 10 * 1024 * 1024),
                user_agent: env::var("SCRAPER_USER_AGENT")
                    .unwrap_or_else(|_| "Vigil/0.1 (+https://github.com/vigil-live/vigil)".to_string()),
            },
            processing: ProcessingConfig {
                chunk_token_limit: parse_env_or("CHUNK_TOKEN_LIMIT", 512),
                deep_search_pages: parse_env_or("DEEP_SEARCH_PAGES", 3),
                deep_search_pages_max: parse_env_or("DEEP_SEARCH_PAGES_MAX", 5),
                deep_search_concurrency: parse_env_or("DEEP_SEARCH_CONCURRENCY", 3),
                page_ttl_days: parse_env_or("PAGE_TTL_DAYS", 30),
                sweep_interval_secs: parse_env_or("SWEEP_INTERVAL_SECS", 3600),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "BAAI/bge-small-en-v1.5".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
            },
            analysis: AnalysisConfig {
                confidence_threshold: parse_env_or("ANALYSIS_CONFIDENCE_THRESHOLD", 0.70),
                volume_threshold: parse_env_or("ANALYSIS_VOLUME_THRESHOLD", 3),
                volume_threshold_percent: parse_env_or("ANALYSIS_VOLUME_THRESHOLD_PERCENT", 20.0),
                comparison_timeout_secs: parse_env_or("ANALYSIS_COMPARISON_TIMEOUT", 30),
            },
            learning: LearningConfig {
                feedback_batch_size: parse_env_or("LEARNING_FEEDBACK_BATCH", 5),
                fp_rate_window: parse_env_or("LEARNING_FP_WINDOW", 20),
                cluster_min: parse_env_or("LEARNING_CLUSTER_MIN", 3),
                schedule_tick_secs: parse_env_or("SCHEDULE_TICK_SECS", 60),
            },
            notifications: NotificationsConfig {
                webhooks: env::var("ALERT_WEBHOOKS")
                    .map(|raw| {
                        raw.split(',')
                            .filter_map(|pair| {
                                let (name, url) = pair.split_once('=')?;
                                let name = name.trim();
                                let url = url.trim();
                                if name.is_empty() || url.is_empty() {
                                    tracing::warn!(
                                        "Invalid webhook entry '{}' in ALERT_WEBHOOKS, skipping",
                                        pair
                                    );
                                    None
                                } else {
                                    Some((name.to_string(), url.to_string()))
                                }
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                timeout_secs: parse_env_or("ALERT_WEBHOOK_TIMEOUT", 10),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known LLM providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to treating the whole string as a local model
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_search_config_defaults() {
        std::env::remove_var("SEARCH_PROVIDERS_GENERAL");
        std::env::remove_var("SEARCH_PROVIDER_TIMEOUT");

        let config = Config::default();
        assert!(config.search.general_providers.is_empty());
        assert_eq!(config.search.provider_timeout_secs, 10);
        assert_eq!(config.search.max_results, 20);
    }

    #[test]
    #[serial]
    fn test_provider_list_from_env() {
        std::env::set_var(
            "SEARCH_PROVIDERS_NEWS",
            "searx=https://searx.example.org,brave=https://brave.example.org",
        );
        std::env::set_var("SEARCH_API_KEY_BRAVE", "bk-123");

        let config = Config::default();
        let providers = &config.search.news_providers;
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name, "searx");
        assert_eq!(providers[0].base_url, "https://searx.example.org");
        assert!(providers[0].api_key.is_none());
        assert_eq!(providers[1].name, "brave");
        assert_eq!(providers[1].api_key.as_deref(), Some("bk-123"));

        std::env::remove_var("SEARCH_PROVIDERS_NEWS");
        std::env::remove_var("SEARCH_API_KEY_BRAVE");
    }

    #[test]
    #[serial]
    fn test_provider_list_skips_malformed_entries() {
        std::env::set_var("SEARCH_PROVIDERS_FINANCE", "good=https://x.example,bad,=nope");

        let config = Config::default();
        assert_eq!(config.search.finance_providers.len(), 1);
        assert_eq!(config.search.finance_providers[0].name, "good");

        std::env::remove_var("SEARCH_PROVIDERS_FINANCE");
    }

    #[test]
    #[serial]
    fn test_analysis_defaults() {
        std::env::remove_var("ANALYSIS_CONFIDENCE_THRESHOLD");
        std::env::remove_var("ANALYSIS_VOLUME_THRESHOLD");
        std::env::remove_var("ANALYSIS_VOLUME_THRESHOLD_PERCENT");

        let config = Config::default();
        assert_eq!(config.analysis.confidence_threshold, 0.70);
        assert_eq!(config.analysis.volume_threshold, 3);
        assert_eq!(config.analysis.volume_threshold_percent, 20.0);
    }

    #[test]
    #[serial]
    fn test_llm_config_optional() {
        std::env::remove_var("LLM_MODEL");
        let config = Config::default();
        assert!(config.llm.is_none());

        std::env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        let config = Config::default();
        let llm = config.llm.unwrap();
        assert_eq!(llm.model, "openai/gpt-4o-mini");
        assert_eq!(llm.timeout_secs, 30);
        std::env::remove_var("LLM_MODEL");
    }

    #[test]
    #[serial]
    fn test_webhooks_from_env() {
        std::env::set_var("ALERT_WEBHOOKS", "ops=https://hooks.example/ops, bad");
        let config = Config::default();
        assert_eq!(config.notifications.webhooks.len(), 1);
        assert_eq!(config.notifications.webhooks[0].0, "ops");
        std::env::remove_var("ALERT_WEBHOOKS");
    }

    #[test]
    fn test_parse_llm_provider_model() {
        assert_eq!(
            parse_llm_provider_model("openai/gpt-4o-mini"),
            ("openai", "gpt-4o-mini")
        );
        assert_eq!(
            parse_llm_provider_model("my-local-model"),
            ("local", "my-local-model")
        );
    }

    #[test]
    #[serial]
    fn test_page_ttl_default() {
        std::env::remove_var("PAGE_TTL_DAYS");
        let config = Config::default();
        assert_eq!(config.processing.page_ttl_days, 30);
    }
}
