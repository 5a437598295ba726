use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the log engine and its HTTP surface.
///
/// Every kind maps to a stable `error` string in the response body so
/// clients can branch without parsing messages.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("lookup result malformed: {0}")]
    Normalization(String),
    #[error("nutrition lookup timed out")]
    LookupTimeout,
    #[error("nutrition lookup unavailable: {0}")]
    Transient(String),
    #[error("conflicting concurrent update")]
    Conflict,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation",
            Self::Normalization(_) => "normalization",
            Self::LookupTimeout => "lookup_timeout",
            Self::Transient(_) => "lookup_unavailable",
            Self::Conflict => "conflict",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Normalization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LookupTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Transient(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({ "error": self.kind(), "message": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ApiError::NotFound("log").kind(), "not_found");
        assert_eq!(ApiError::LookupTimeout.kind(), "lookup_timeout");
        assert_eq!(ApiError::Conflict.kind(), "conflict");
        assert_eq!(
            ApiError::Normalization("missing field".into()).kind(),
            "normalization"
        );
    }

    #[test]
    fn server_errors_redact_the_message() {
        let response = ApiError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = ApiError::NotFound("entry").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
