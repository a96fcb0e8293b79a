use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `IDENTITY_MISSING`, `IDENTITY_INVALID`, `PERMISSION_DENIED`,
    /// `NOT_FOUND`, `CONFLICT`, `BUSY`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Alias must be 2-30 lowercase letters or digits")]
    pub message: String,
}

/// Success envelope for mutating endpoints.
#[derive(Serialize, utoipa::ToSchema)]
pub struct OkBody {
    /// Always `"ok"`.
    #[schema(example = "ok")]
    pub status: &'static str,
    /// Identifier of the queued run, for endpoints that start one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl OkBody {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            run_id: None,
        }
    }

    pub fn with_run(run_id: String) -> Self {
        Self {
            status: "ok",
            run_id: Some(run_id),
        }
    }
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    IdentityMissing,
    IdentityInvalid,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    /// The service is at capacity for the requested work.
    Busy(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::IdentityMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "IDENTITY_MISSING",
                    message: "Acting user identity required".into(),
                },
            ),
            AppError::IdentityInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "IDENTITY_INVALID",
                    message: "Malformed user identity".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::Busy(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    code: "BUSY",
                    message: msg,
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(hash) => AppError::NotFound(format!("Blob {hash} not found")),
            StorageError::InvalidHash(msg) => AppError::Validation(msg),
            StorageError::SizeLimitExceeded { actual, limit } => AppError::Validation(format!(
                "Data exceeds size limit ({actual} > {limit} bytes)"
            )),
            StorageError::Io(e) => AppError::Internal(format!("Storage IO error: {e}")),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Serialization error: {err}"))
    }
}
