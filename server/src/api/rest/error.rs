//! Error handling for REST API
//!
//! Provides the `AppError` type returned by every handler, the JSON error
//! bodies it renders, and the bearer-token helper.

use crate::api::AppState;
use crate::auth;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// Missing or unrecognised `operation`; the body lists the valid ones
    UnknownOperation {
        message: String,
        valid: &'static [&'static str],
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    MethodNotAllowed(&'static [&'static str]),
    /// A storage operation failed while executing
    Operation(Box<OperationFailure>),
}

/// Request fields echoed back in operation failure bodies
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEcho {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OperationFailure {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    /// Diagnostic detail, omitted in production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub operation: String,
    #[serde(flatten)]
    pub input: RequestEcho,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_operations: Option<&'a [&'a str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_methods: Option<&'a [&'a str]>,
}

impl ErrorBody<'_> {
    fn plain(error: &str) -> ErrorBody<'_> {
        ErrorBody {
            error,
            valid_operations: None,
            allowed_methods: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody::plain(&msg))).into_response()
            }
            AppError::UnknownOperation { message, valid } => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    valid_operations: Some(valid),
                    ..ErrorBody::plain(&message)
                }),
            )
                .into_response(),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::plain(&msg))).into_response()
            }
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, Json(ErrorBody::plain(&msg))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::plain(&msg))).into_response()
            }
            AppError::MethodNotAllowed(allowed) => {
                let allow = HeaderValue::from_str(&allowed.join(", "))
                    .unwrap_or_else(|_| HeaderValue::from_static("POST, DELETE, OPTIONS"));
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    [(header::ALLOW, allow)],
                    Json(ErrorBody {
                        allowed_methods: Some(allowed),
                        ..ErrorBody::plain("Method not allowed")
                    }),
                )
                    .into_response()
            }
            AppError::Operation(failure) => (failure.status, Json(failure)).into_response(),
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Extract the caller ID from the Authorization header
pub fn extract_caller_id(state: &AppState, headers: &axum::http::HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".into()))?;

    auth::verify_token(&state.config.jwt_secret, token).map_err(|e| {
        tracing::debug!("token rejected: {}", e);
        AppError::Unauthorized("Invalid or expired token".into())
    })
}
