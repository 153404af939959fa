//! # V1 API Key Authentication Middleware
//!
//! Protects all v1 API routes (except explicitly public ones like `/health`)
//! with Bearer token authentication. Validates the token against the
//! `VIGIL_API_KEYS` configuration.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;

use super::response::{ApiResponse, ErrorCode};

/// Axum middleware that enforces Bearer token authentication for v1 API routes.
///
/// # Behavior
///
/// - If `VIGIL_API_KEYS` is empty/unset → returns 401 with JSON error envelope.
///   The server still starts, but protected routes are locked down.
/// - If the `Authorization: Bearer <token>` header is missing or malformed → 401.
/// - If the token is not in the configured key list → 401.
/// - If the token is valid → passes the request through to the next handler.
pub async fn v1_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.config.server.api_keys.is_empty() {
        return ApiResponse::<()>::error(
            ErrorCode::Unauthorized,
            "API keys not configured. Set VIGIL_API_KEYS to enable access.",
        )
        .into_response();
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return ApiResponse::<()>::error(
                ErrorCode::Unauthorized,
                "Invalid authorization header format. Expected: Bearer <token>",
            )
            .into_response();
        }
        None => {
            return ApiResponse::<()>::error(
                ErrorCode::Unauthorized,
                "Missing authorization header",
            )
            .into_response();
        }
    };

    if state.config.server.api_keys.contains(&token.to_string()) {
        next.run(request).await
    } else {
        ApiResponse::<()>::error(ErrorCode::Unauthorized, "Invalid API key").into_response()
    }
}
