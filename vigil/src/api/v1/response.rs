//! # V1 API Response Envelope & Error Contract
//!
//! Canonical wire format for all v1 API responses. Every endpoint returns
//! an [`ApiResponse<T>`] envelope with three optional top-level fields:
//!
//! ```json
//! {
//!   "data": { ... },       // present on success, absent on error
//!   "meta": { "total": 42 },  // optional list metadata
//!   "error": { "code": "not_found", "message": "..." }  // present on error
//! }
//! ```
//!
//! ## ID Formats
//!
//! - **searchId**: `srch_` + nanoid (e.g. `"srch_V1StGXR8_Z5jdHi6B-myT"`)
//! - **executionId**: `exec_` + nanoid
//! - **alertId**: `alrt_` + nanoid
//! - **ruleId**: `rule_` + nanoid

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::VigilError;

/// Machine-readable error code included in every error response.
///
/// Serialized as a snake_case string on the wire (e.g. `"invalid_request"`).
/// Each variant maps to a fixed HTTP status code via [`ErrorCode::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request was malformed, had invalid parameters, or failed
    /// validation. HTTP 400.
    InvalidRequest,
    /// Authentication is required or the provided credentials are invalid.
    /// HTTP 401.
    Unauthorized,
    /// The requested resource does not exist. HTTP 404.
    NotFound,
    /// The request conflicts with the current state of the resource.
    /// HTTP 409.
    Conflict,
    /// An upstream dependency (search provider, target site, LLM) refused
    /// the request with a rate limit. HTTP 429.
    RateLimited,
    /// An unexpected server-side error occurred. Internal details are never
    /// leaked to the client. HTTP 500.
    InternalError,
    /// The requested feature is not available in this deployment (e.g. no
    /// LLM configured). HTTP 501.
    NotImplemented,
    /// Every upstream provider in the fallback chain failed, or the target
    /// site could not be reached. HTTP 502.
    UpstreamFailed,
}

impl ErrorCode {
    /// Returns the HTTP status code corresponding to this error code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::InternalError => write!(f, "internal_error"),
            Self::NotImplemented => write!(f, "not_implemented"),
            Self::UpstreamFailed => write!(f, "upstream_failed"),
        }
    }
}

/// Structured error payload within the API envelope.
///
/// ```json
/// { "code": "not_found", "message": "Search srch_abc123 not found" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error classification.
    pub code: ErrorCode,
    /// Human-readable description safe to display to end users.
    /// Internal implementation details are never included.
    pub message: String,
}

/// List metadata included in list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Total number of items returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Canonical v1 API response envelope.
///
/// Every v1 endpoint returns this shape. On success, `data` is present and
/// `error` is absent. On error, `error` is present and `data` is absent.
///
/// The HTTP status code is derived from the error code (on error) or
/// from the explicit status set via constructors like [`ApiResponse::created`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// The response payload. Present on success, absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// List metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    /// Error details. Present on error, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// HTTP status to use in the response. Not serialized on the wire.
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// Success response with data (HTTP 200).
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::OK,
        }
    }

    /// Success response with data and list metadata (HTTP 200).
    pub fn success_with_meta(data: T, meta: ResponseMeta) -> Self {
        Self {
            data: Some(data),
            meta: Some(meta),
            error: None,
            status: StatusCode::OK,
        }
    }

    /// Resource created response (HTTP 201).
    pub fn created(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::CREATED,
        }
    }

    /// Accepted for processing response (HTTP 202).
    ///
    /// Used when the server has accepted the request but processing is not
    /// yet complete (e.g. deep search running in the background).
    pub fn accepted(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
            status: StatusCode::ACCEPTED,
        }
    }

    /// Error response. HTTP status is derived from the [`ErrorCode`].
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let status = code.status();
        Self {
            data: None,
            meta: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
            status,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        match serde_json::to_value(&self) {
            Ok(body) => (status, Json(body)).into_response(),
            Err(_) => {
                let fallback =
                    ApiResponse::<()>::error(ErrorCode::InternalError, "An internal error occurred");
                let body = serde_json::json!({
                    "error": {
                        "code": "internal_error",
                        "message": "An internal error occurred"
                    }
                });
                (fallback.status, Json(body)).into_response()
            }
        }
    }
}

impl<T: Serialize> From<VigilError> for ApiResponse<T> {
    /// Convert a [`VigilError`] into a v1 [`ApiResponse`].
    ///
    /// Internal error details are **never** leaked to the client. For
    /// `internal_error` responses, a generic message is returned and the
    /// real error is logged via `tracing::error!`.
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::NotFound(ref msg) => ApiResponse::error(ErrorCode::NotFound, msg.clone()),

            VigilError::Validation(ref msg) => {
                ApiResponse::error(ErrorCode::InvalidRequest, msg.clone())
            }

            VigilError::Json(ref e) => {
                ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid JSON: {e}"))
            }

            VigilError::UrlParse(ref e) => {
                ApiResponse::error(ErrorCode::InvalidRequest, format!("Invalid URL: {e}"))
            }

            VigilError::ProviderExhausted { ref query, .. } => ApiResponse::error(
                ErrorCode::UpstreamFailed,
                format!("All search providers failed for '{query}'"),
            ),

            VigilError::ScrapeFailed { ref url, .. } => ApiResponse::error(
                ErrorCode::UpstreamFailed,
                format!("Could not fetch {url}"),
            ),

            VigilError::ProviderQuota { retry_after, .. }
            | VigilError::LlmRateLimit { retry_after } => {
                let msg = match retry_after {
                    Some(secs) => format!("Rate limit exceeded, retry after {secs} seconds"),
                    None => "Rate limit exceeded".to_string(),
                };
                ApiResponse::error(ErrorCode::RateLimited, msg)
            }

            VigilError::LlmUnavailable(ref msg) => {
                ApiResponse::error(ErrorCode::NotImplemented, msg.clone())
            }

            ref internal @ (VigilError::Database(_)
            | VigilError::Http(_)
            | VigilError::Io(_)
            | VigilError::Embedding(_)
            | VigilError::EmbeddingFailed { .. }
            | VigilError::AnalysisFailed { .. }
            | VigilError::Llm(_)
            | VigilError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error in v1 API");
                ApiResponse::error(ErrorCode::InternalError, "An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_success_envelope_omits_error() {
        let resp = ApiResponse::success(serde_json::json!({"ok": true}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"]["ok"], true);
        assert!(value.get("error").is_none());
        assert!(value.get("meta").is_none());
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let resp = ApiResponse::<()>::error(ErrorCode::NotFound, "Search srch_x not found");
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], "not_found");
        assert_eq!(value["error"]["message"], "Search srch_x not found");
    }

    #[test]
    fn test_error_code_statuses() {
        assert_eq!(ErrorCode::InvalidRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ErrorCode::UpstreamFailed.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = VigilError::Internal("connection string with secrets".to_string());
        let resp: ApiResponse<()> = err.into();
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], "internal_error");
        assert_eq!(value["error"]["message"], "An internal error occurred");
    }

    #[test]
    fn test_provider_exhausted_maps_to_upstream_failed() {
        let err = VigilError::ProviderExhausted {
            query: "rust releases".to_string(),
            detail: "searx: timeout; brave: 500".to_string(),
        };
        let resp: ApiResponse<()> = err.into();
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["error"]["code"], "upstream_failed");
        // Per-provider detail stays server-side.
        assert!(!value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("searx"));
    }
}
