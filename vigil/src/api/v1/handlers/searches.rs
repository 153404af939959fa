//! v1 recurring search handlers.

use axum::extract::{Path, Query, State};
use chrono::Utc;
use nanoid::nanoid;
use validator::Validate;

use crate::api::v1::dto::{
    CancelSearchResponse, CreateSearchRequest, ListSearchesQuery, SearchConfigResponse,
    TriggerSearchResponse, UpdateSearchRequest,
};
use crate::api::v1::response::{ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::models::{RecurringSearchConfig, SearchType};

/// `POST /api/v1/searches`
pub async fn create_search(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<CreateSearchRequest>,
) -> ApiResponse<SearchConfigResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, e.to_string());
    }

    let mut config = RecurringSearchConfig::new(
        format!("srch_{}", nanoid!()),
        req.tenant_id,
        req.project_id,
        req.query.trim().to_string(),
        req.search_type.unwrap_or(SearchType::General),
    );
    config.schedule_interval_secs = req.schedule_interval_secs;
    if let Some(sensitivity) = req.sensitivity {
        config.sensitivity = sensitivity;
    }
    config.confidence_threshold = req.confidence_threshold;
    config.volume_threshold = req.volume_threshold;
    config.volume_threshold_percent = req.volume_threshold_percent;
    config.require_both_thresholds = req.require_both_thresholds.unwrap_or(false);
    config.custom_prompt = req.custom_prompt;
    config.focus_areas = req.focus_areas;
    config.ignore_patterns = req.ignore_patterns;

    match state.db.create_recurring(&config).await {
        Ok(()) => ApiResponse::created(SearchConfigResponse::from(config)),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/searches`
pub async fn list_searches(
    State(state): State<AppState>,
    Query(query): Query<ListSearchesQuery>,
) -> ApiResponse<Vec<SearchConfigResponse>> {
    match state.db.list_recurring(&query.tenant_id).await {
        Ok(searches) => {
            let total = searches.len() as u64;
            let data = searches.into_iter().map(Into::into).collect();
            ApiResponse::success_with_meta(data, ResponseMeta { total: Some(total) })
        }
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/searches/{searchId}`
pub async fn get_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> ApiResponse<SearchConfigResponse> {
    match state.db.get_recurring(&search_id).await {
        Ok(Some(config)) => ApiResponse::success(config.into()),
        Ok(None) => {
            ApiResponse::error(ErrorCode::NotFound, format!("Search {search_id} not found"))
        }
        Err(e) => e.into(),
    }
}

/// `PATCH /api/v1/searches/{searchId}`
pub async fn update_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
    axum::Json(req): axum::Json<UpdateSearchRequest>,
) -> ApiResponse<SearchConfigResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, e.to_string());
    }

    let mut config = match state.db.get_recurring(&search_id).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            return ApiResponse::error(ErrorCode::NotFound, format!("Search {search_id} not found"))
        }
        Err(e) => return e.into(),
    };

    if let Some(query) = req.query {
        config.query = query.trim().to_string();
    }
    if let Some(search_type) = req.search_type {
        config.search_type = search_type;
    }
    if let Some(interval) = req.schedule_interval_secs {
        config.schedule_interval_secs = Some(interval);
    }
    if let Some(sensitivity) = req.sensitivity {
        // A user-set sensitivity supersedes any learned recommendation.
        config.sensitivity = sensitivity;
        config.recommended_sensitivity = None;
    }
    if let Some(threshold) = req.confidence_threshold {
        config.confidence_threshold = Some(threshold);
    }
    if let Some(threshold) = req.volume_threshold {
        config.volume_threshold = Some(threshold);
    }
    if let Some(percent) = req.volume_threshold_percent {
        config.volume_threshold_percent = Some(percent);
    }
    if let Some(require_both) = req.require_both_thresholds {
        config.require_both_thresholds = require_both;
    }
    if let Some(prompt) = req.custom_prompt {
        config.custom_prompt = Some(prompt);
    }
    if let Some(focus_areas) = req.focus_areas {
        config.focus_areas = focus_areas;
    }
    if let Some(ignore_patterns) = req.ignore_patterns {
        config.ignore_patterns = ignore_patterns;
    }
    config.updated_at = Utc::now();

    match state.db.update_recurring(&config).await {
        Ok(()) => ApiResponse::success(config.into()),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/searches/{searchId}`
pub async fn delete_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> ApiResponse<serde_json::Value> {
    // Stop any in-flight pipeline before removing the config.
    state.search.cancel(&search_id);

    match state.db.delete_recurring(&search_id).await {
        Ok(true) => ApiResponse::success(serde_json::json!({ "deleted": true })),
        Ok(false) => {
            ApiResponse::error(ErrorCode::NotFound, format!("Search {search_id} not found"))
        }
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/searches/{searchId}/trigger`
///
/// Runs the provider search synchronously, then detaches scraping and
/// delta analysis. 202 because the interesting work is still running
/// when the response goes out.
pub async fn trigger_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> ApiResponse<TriggerSearchResponse> {
    match state.search.trigger(&search_id).await {
        Ok(resp) => ApiResponse::accepted(TriggerSearchResponse {
            search_id: resp.search_id,
            execution_id: resp.execution_id,
            results: resp.results,
        }),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/searches/{searchId}/cancel`
pub async fn cancel_search(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> ApiResponse<CancelSearchResponse> {
    let cancelled = state.search.cancel(&search_id);
    ApiResponse::success(CancelSearchResponse {
        search_id,
        cancelled,
    })
}
