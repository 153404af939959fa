//! v1 suppression rule handlers.

use axum::extract::{Path, State};
use chrono::Utc;
use nanoid::nanoid;
use validator::Validate;

use crate::api::v1::dto::{CreateRuleRequest, RuleResponse};
use crate::api::v1::response::{ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::models::{RuleOrigin, RuleType, SuppressionRule};

/// `GET /api/v1/searches/{searchId}/rules`
pub async fn list_rules(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> ApiResponse<Vec<RuleResponse>> {
    match state.db.active_rules(&search_id).await {
        Ok(rules) => {
            let total = rules.len() as u64;
            let data = rules.into_iter().map(Into::into).collect();
            ApiResponse::success_with_meta(data, ResponseMeta { total: Some(total) })
        }
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/searches/{searchId}/rules`
pub async fn create_rule(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
    axum::Json(req): axum::Json<CreateRuleRequest>,
) -> ApiResponse<RuleResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, e.to_string());
    }

    // A pattern rule with an invalid regex would silently never match.
    if req.rule_type == RuleType::Pattern {
        if let Err(e) = regex::Regex::new(&req.condition) {
            return ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid pattern: {e}"));
        }
    }

    let search = match state.db.get_recurring(&search_id).await {
        Ok(Some(search)) => search,
        Ok(None) => {
            return ApiResponse::error(ErrorCode::NotFound, format!("Search {search_id} not found"))
        }
        Err(e) => return e.into(),
    };

    let rule = SuppressionRule {
        id: format!("rule_{}", nanoid!()),
        search_id: search.search_id,
        tenant_id: search.tenant_id,
        rule_type: req.rule_type,
        condition: req.condition,
        created_by: RuleOrigin::User,
        applied_count: 0,
        effectiveness: 0.0,
        created_at: Utc::now(),
        deleted_at: None,
    };

    match state.db.create_rule(&rule).await {
        Ok(()) => ApiResponse::created(rule.into()),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/rules/{ruleId}`
///
/// Soft delete. A removed rule stops matching immediately but its
/// applied-count history is kept.
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResponse<serde_json::Value> {
    match state.db.soft_delete_rule(&rule_id).await {
        Ok(true) => ApiResponse::success(serde_json::json!({ "deleted": true })),
        Ok(false) => ApiResponse::error(ErrorCode::NotFound, format!("Rule {rule_id} not found")),
        Err(e) => e.into(),
    }
}
