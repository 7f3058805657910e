use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{is_unique_violation, AuthError};
use crate::services::{ImportError, RowError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Request body is larger than {0} bytes")]
    PayloadTooLarge(usize),

    #[error("{message}")]
    ImportRejected {
        message: String,
        details: Vec<RowError>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Model validation failures are reported to the caller verbatim
    pub fn validation(err: anyhow::Error) -> Self {
        ApiError::Validation(err.to_string())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::ImportRejected { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "IMPORT_REJECTED")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Auth(err) => (err.status(), "AUTH_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let this = match self {
            ApiError::Internal(err)
                if err
                    .downcast_ref::<sqlx::Error>()
                    .is_some_and(is_unique_violation) =>
            {
                ApiError::Conflict("A record with the same unique value already exists".to_string())
            }
            other => other,
        };
        let (status, error_code) = this.status_and_code();

        let (message, details) = match this {
            ApiError::Auth(err) => return err.into_response(),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                ("Internal server error".to_string(), None)
            }
            ApiError::ImportRejected { message, details } => {
                let details = serde_json::to_value(details).ok();
                (message, details)
            }
            other => (other.to_string(), None),
        };

        (
            status,
            Json(ErrorBody {
                error_code,
                message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(super::routes::MAX_REQUEST_BYTES)
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(crate::services::MAX_IMPORT_BYTES)
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Rejected { message, errors } => ApiError::ImportRejected {
                message,
                details: errors,
            },
            ImportError::Internal(err) => ApiError::Internal(err),
            other => ApiError::ImportRejected {
                message: other.to_string(),
                details: Vec::new(),
            },
        }
    }
}
