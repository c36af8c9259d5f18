use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sqlgate_db::QueryError;

use crate::envelope::{ErrorCode, ErrorEnvelope};

/// Error returned by the HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The body is not a valid request envelope.
    #[error("invalid request body: {0}")]
    Body(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> (StatusCode, ErrorCode) {
        match self {
            Self::Body(_) | Self::Query(QueryError::MalformedPayload(_)) => {
                (StatusCode::BAD_REQUEST, ErrorCode::ValidationError)
            }
            Self::Query(QueryError::PolicyViolation) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadRequest)
            }
            Self::Query(QueryError::NotFound) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            Self::Query(QueryError::Conflict) => (StatusCode::CONFLICT, ErrorCode::Conflict),
            Self::Query(QueryError::ServiceUnavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::InternalServerError)
            }
            Self::Query(QueryError::InternalError) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalServerError)
            }
        }
    }

    /// The error envelope sent to the client.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let (status, code) = self.status();
        let envelope = ErrorEnvelope::new(status.as_u16(), code, self.to_string());
        match self {
            Self::Body(detail) | Self::Query(QueryError::MalformedPayload(detail)) => {
                envelope.with_errors(json!([{ "field": "payload", "detail": detail }]))
            }
            Self::Query(e) if e.is_retryable() => {
                envelope.with_errors(json!({ "retryable": true }))
            }
            Self::Query(_) => envelope,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = self.to_envelope();
        if envelope.status_code >= 500 {
            tracing::warn!(status = envelope.status_code, error = %self, "request failed");
        } else {
            tracing::debug!(status = envelope.status_code, error = %self, "request rejected");
        }
        let status =
            StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}
