//! I define the wire error shape, and the mapping of domain
//! errors onto it.
//!

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kosha_accounts::AccountsError;
use kosha_storage::StorageError;
use serde_json::json;
use tracing::error;

/// A wire-shaped api error: status, stable machine-readable
/// code, and a human-readable message. Never leaks internal
/// paths or backtraces.
#[derive(Debug)]
pub struct ApiError {
    /// Http status.
    pub status: StatusCode,

    /// Stable machine-readable code.
    pub code: &'static str,

    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Create an error from parts.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 404 with `RESOURCE_NOT_FOUND`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND", message)
    }

    /// 400 with `INVALID_ARGUMENT`.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
    }

    /// 400 with `MISSING_CONTENT_TYPE`.
    pub fn missing_content_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "MISSING_CONTENT_TYPE",
            "A Content-Type header is required.",
        )
    }

    /// 401 with `UNAUTHORIZED`. Raised by the pluggable
    /// authentication gate.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 403 with `FORBIDDEN`. Raised by the pluggable
    /// authorization gate.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// 500 with `INTERNAL`.
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal server error.",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match &e {
            StorageError::ResourceNotFound { .. } => Self::not_found(e.to_string()),
            StorageError::AlreadyExists { .. } => {
                Self::new(StatusCode::CONFLICT, "ALREADY_EXISTS", e.to_string())
            }
            StorageError::ContainerNotEmpty { .. } => {
                Self::new(StatusCode::CONFLICT, "CONTAINER_NOT_EMPTY", e.to_string())
            }
            StorageError::InvalidRdf { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_RDF", e.to_string())
            }
            StorageError::UnsupportedFormat { .. } => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FORMAT",
                e.to_string(),
            ),
            StorageError::NotAcceptable => Self::new(
                StatusCode::NOT_ACCEPTABLE,
                "NOT_ACCEPTABLE",
                e.to_string(),
            ),
            StorageError::InvalidArgument { .. } => Self::invalid_argument(e.to_string()),
            StorageError::Cancelled | StorageError::Internal { .. } => {
                error!("Storage operation failed. {}", e);
                Self::internal()
            }
        }
    }
}

impl From<AccountsError> for ApiError {
    fn from(e: AccountsError) -> Self {
        match &e {
            AccountsError::NotFound { .. } => Self::not_found(e.to_string()),
            AccountsError::AlreadyExists { .. } => {
                Self::new(StatusCode::CONFLICT, "ALREADY_EXISTS", e.to_string())
            }
            AccountsError::InvalidArgument { .. }
            | AccountsError::InvalidTransition(_)
            | AccountsError::WebIdSpaceExhausted { .. } => Self::invalid_argument(e.to_string()),
            AccountsError::Db(_) | AccountsError::Internal { .. } => {
                error!("Accounts operation failed. {}", e);
                Self::internal()
            }
        }
    }
}

// ----------------------------------------
//                                      tests
// ----------------------------------------

#[cfg(test)]
mod tests {
    use kosha_space::OpaqueId;

    use super::*;

    #[test]
    fn storage_errors_map_to_stable_codes() {
        let id = OpaqueId::generate();
        let cases: Vec<(StorageError, StatusCode, &str)> = vec![
            (
                StorageError::ResourceNotFound { id },
                StatusCode::NOT_FOUND,
                "RESOURCE_NOT_FOUND",
            ),
            (
                StorageError::AlreadyExists { id },
                StatusCode::CONFLICT,
                "ALREADY_EXISTS",
            ),
            (
                StorageError::ContainerNotEmpty { id },
                StatusCode::CONFLICT,
                "CONTAINER_NOT_EMPTY",
            ),
            (
                StorageError::InvalidRdf {
                    message: "bad".into(),
                },
                StatusCode::BAD_REQUEST,
                "INVALID_RDF",
            ),
            (
                StorageError::UnsupportedFormat {
                    content_type: "application/zip".into(),
                },
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FORMAT",
            ),
            (
                StorageError::NotAcceptable,
                StatusCode::NOT_ACCEPTABLE,
                "NOT_ACCEPTABLE",
            ),
        ];

        for (domain_error, status, code) in cases {
            let api_error = ApiError::from(domain_error);
            assert_eq!(api_error.status, status);
            assert_eq!(api_error.code, code);
        }
    }
}
