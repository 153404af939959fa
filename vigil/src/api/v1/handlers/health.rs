use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;
use crate::llm::LlmBackend;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub embeddings: EmbeddingsStatus,
    pub llm: LlmStatus,
    pub providers: ProviderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsStatus {
    pub status: String,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Configured search provider chain lengths per search type. Zero means
/// searches of that type fail immediately with `upstream_failed`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub general: usize,
    pub news: usize,
    pub finance: usize,
}

/// `GET /api/v1/health`
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let db_status = match state.db.feedback_count("__health__").await {
        Ok(_) => DatabaseStatus {
            status: "ok".to_string(),
        },
        Err(_) => DatabaseStatus {
            status: "error".to_string(),
        },
    };

    let embeddings_status = EmbeddingsStatus {
        status: "ok".to_string(),
        model: state.config.embeddings.model.clone(),
        dimensions: state.embedder.dimensions(),
    };

    let llm_status = if state.llm.is_available() {
        let provider = match state.llm.backend() {
            LlmBackend::OpenAI => "openai",
            LlmBackend::OpenRouter => "openrouter",
            LlmBackend::Ollama => "ollama",
            LlmBackend::LmStudio => "lmstudio",
            LlmBackend::OpenAICompatible { .. } => "openai-compatible",
            LlmBackend::Unavailable { .. } => "unavailable",
        };
        LlmStatus {
            status: "available".to_string(),
            provider: Some(provider.to_string()),
            model: state.config.llm.as_ref().map(|c| c.model.clone()),
        }
    } else {
        LlmStatus {
            status: "unavailable".to_string(),
            provider: None,
            model: None,
        }
    };

    let providers = ProviderStatus {
        general: state.config.search.general_providers.len(),
        news: state.config.search.news_providers.len(),
        finance: state.config.search.finance_providers.len(),
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        embeddings: embeddings_status,
        llm: llm_status,
        providers,
    })
}
