use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::scheduling::SessionError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let msg = e.to_string();
        match e {
            SessionError::PendingReservation(_) | SessionError::PackageComplete { .. } => {
                ApiError::Conflict("PACKAGE_UNAVAILABLE", msg)
            }
            SessionError::UnknownService(_) => ApiError::BadRequest("UNKNOWN_SERVICE", msg),
            SessionError::UnknownOrder(_) => ApiError::BadRequest("UNKNOWN_ORDER", msg),
            SessionError::UnknownTempPackage(_) => ApiError::BadRequest("UNKNOWN_PACKAGE", msg),
            SessionError::ServiceMismatch { .. } => ApiError::BadRequest("SERVICE_MISMATCH", msg),
            SessionError::IndexOutOfRange { .. } => ApiError::BadRequest("INVALID_INDEX", msg),
            SessionError::InvalidPrice(_) | SessionError::PriceNotEditable(_) => {
                ApiError::BadRequest("INVALID_PRICE", msg)
            }
            SessionError::InvalidOperations(_) => ApiError::BadRequest("INVALID_OPERATIONS", msg),
            SessionError::InvalidDraft(_) => ApiError::BadRequest("INVALID_DRAFT", msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(e) => {
                warn!(error = %e, "database failure");
                ApiError::Internal(format!("db error: {e}"))
            }
            StoreError::NotFound(what) => ApiError::NotFound("NOT_FOUND", format!("{what} not found")),
            StoreError::Conflict(msg) => ApiError::Conflict("SESSION_CONFLICT", msg),
            StoreError::Invalid(msg) => ApiError::BadRequest("VALIDATION_ERROR", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg),
            )
                .into_response(),
        }
    }
}
