//! v1 alert handlers.

use axum::extract::{Path, Query, State};
use chrono::Utc;
use nanoid::nanoid;
use validator::Validate;

use crate::api::v1::dto::{AlertFeedbackRequest, AlertResponse, ListAlertsQuery, UpdateAlertRequest};
use crate::api::v1::response::{ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::models::{AlertFeedback, AlertStatus};

/// `GET /api/v1/alerts`
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> ApiResponse<Vec<AlertResponse>> {
    let limit = query.effective_limit();
    match state
        .db
        .list_alerts(&query.tenant_id, query.search_id.as_deref(), limit)
        .await
    {
        Ok(alerts) => {
            let total = alerts.len() as u64;
            let data = alerts.into_iter().map(Into::into).collect();
            ApiResponse::success_with_meta(data, ResponseMeta { total: Some(total) })
        }
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/alerts/{alertId}`
pub async fn get_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> ApiResponse<AlertResponse> {
    match state.db.get_alert(&alert_id).await {
        Ok(Some(alert)) => ApiResponse::success(alert.into()),
        Ok(None) => ApiResponse::error(ErrorCode::NotFound, format!("Alert {alert_id} not found")),
        Err(e) => e.into(),
    }
}

/// `PATCH /api/v1/alerts/{alertId}`
pub async fn update_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    axum::Json(req): axum::Json<UpdateAlertRequest>,
) -> ApiResponse<AlertResponse> {
    if req.status == AlertStatus::Snoozed && req.snooze_until.is_none() {
        return ApiResponse::error(
            ErrorCode::InvalidRequest,
            "snoozeUntil is required when status is snoozed",
        );
    }
    let snooze_until = if req.status == AlertStatus::Snoozed {
        req.snooze_until
    } else {
        None
    };

    match state.db.get_alert(&alert_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiResponse::error(ErrorCode::NotFound, format!("Alert {alert_id} not found"))
        }
        Err(e) => return e.into(),
    }

    if let Err(e) = state
        .db
        .update_alert_status(&alert_id, req.status, snooze_until)
        .await
    {
        return e.into();
    }

    match state.db.get_alert(&alert_id).await {
        Ok(Some(alert)) => ApiResponse::success(alert.into()),
        Ok(None) => ApiResponse::error(ErrorCode::NotFound, format!("Alert {alert_id} not found")),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/alerts/{alertId}/feedback`
///
/// Records feedback on the alert and appends an entry to the feedback
/// log. The learning engine runs afterwards in the background; a slow
/// aggregation never delays the response.
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    axum::Json(req): axum::Json<AlertFeedbackRequest>,
) -> ApiResponse<AlertResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::error(ErrorCode::InvalidRequest, e.to_string());
    }

    let alert = match state.db.get_alert(&alert_id).await {
        Ok(Some(alert)) => alert,
        Ok(None) => {
            return ApiResponse::error(ErrorCode::NotFound, format!("Alert {alert_id} not found"))
        }
        Err(e) => return e.into(),
    };

    if let Err(e) = state
        .db
        .set_alert_feedback(&alert_id, req.feedback, req.comment.as_deref())
        .await
    {
        return e.into();
    }

    let entry = AlertFeedback {
        id: format!("fb_{}", nanoid!()),
        alert_id: alert_id.clone(),
        search_id: alert.search_id.clone(),
        user_id: req.user_id,
        feedback: req.feedback,
        comment: req.comment,
        provided_at: Utc::now(),
    };
    if let Err(e) = state.db.append_feedback(&entry).await {
        return e.into();
    }

    let learning = state.learning.clone();
    let search_id = alert.search_id.clone();
    tokio::spawn(async move {
        if let Err(e) = learning.on_feedback(&search_id).await {
            tracing::error!(error = %e, search_id, "Learning pass after feedback failed");
        }
    });

    match state.db.get_alert(&alert_id).await {
        Ok(Some(alert)) => ApiResponse::success(alert.into()),
        Ok(None) => ApiResponse::error(ErrorCode::NotFound, format!("Alert {alert_id} not found")),
        Err(e) => e.into(),
    }
}
