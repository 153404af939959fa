use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("All search providers failed for '{query}': {detail}")]
    ProviderExhausted { query: String, detail: String },

    #[error("Provider '{provider}' quota exceeded, retry after {retry_after:?} seconds")]
    ProviderQuota {
        provider: String,
        retry_after: Option<u64>,
    },

    #[error("Scrape failed for {url}: {reason}")]
    ScrapeFailed { url: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding failed for page {url} after retry: {reason}")]
    EmbeddingFailed { url: String, reason: String },

    #[error("Delta analysis failed for execution {execution_id}: {reason}")]
    AnalysisFailed {
        execution_id: String,
        reason: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl VigilError {
    /// True for failures worth one more attempt (network hiccups,
    /// upstream 5xx, rate limits), false for everything deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VigilError::Http(_)
                | VigilError::Llm(_)
                | VigilError::LlmRateLimit { .. }
                | VigilError::Embedding(_)
        )
    }

    /// True when a write was rejected by a unique index. libsql surfaces
    /// constraint failures as SQLite error messages, not typed variants.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            VigilError::Database(e) => e.to_string().contains("UNIQUE constraint failed"),
            _ => false,
        }
    }
}

impl IntoResponse for VigilError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            VigilError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            VigilError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            VigilError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            VigilError::Http(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            VigilError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            VigilError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            VigilError::UrlParse(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            VigilError::ProviderExhausted { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            VigilError::ProviderQuota { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            VigilError::ScrapeFailed { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            VigilError::Embedding(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            VigilError::EmbeddingFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            VigilError::AnalysisFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            VigilError::Llm(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            VigilError::LlmUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            VigilError::LlmRateLimit { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("LLM rate limit exceeded, retry after {retry_after:?} seconds"),
            ),
            VigilError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
