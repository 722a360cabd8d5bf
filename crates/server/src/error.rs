use crate::alerts::NotifyError;
use crate::store::StoreError;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use hyper::StatusCode;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors surfaced by the alert handlers.
///
/// An invalid signed link is not an error: handlers render a `key_error`
/// state for it instead.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("This page is unavailable while the database is read-only")]
    ReadOnly,
    #[error("{0}")]
    Unimplemented(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Failed to send email: {0}")]
    Notify(#[from] NotifyError),
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AlertError {
    pub fn not_found(description: impl Into<String>) -> Self {
        Self::NotFound(description.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AlertError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AlertError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AlertError::ReadOnly => StatusCode::SERVICE_UNAVAILABLE,
            AlertError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AlertError::Database(_) | AlertError::Notify(_) | AlertError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AlertError::NotFound(_) => "not_found",
            AlertError::PermissionDenied(_) => "forbidden",
            AlertError::BadRequest(_) => "bad_request",
            AlertError::ReadOnly => "read_only",
            AlertError::Unimplemented(_) => "not_implemented",
            AlertError::Database(_) | AlertError::Notify(_) | AlertError::Signing(_) => {
                "server_error"
            }
        }
    }
}

impl From<StoreError> for AlertError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AlertError::Database(e),
            // Queries the search layer cannot handle have no user-facing
            // error page yet.
            StoreError::InvalidQuery(e) => AlertError::Unimplemented(format!("Unsupported query: {e}")),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE
        {
            tracing::error!(
                name = "api.error.internal",
                target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                error = %self,
                message = "Request failed"
            );
            None
        } else {
            Some(self.to_string())
        };
        let body = ErrorBody {
            error: self.code().to_string(),
            error_description: description,
        };
        (status, Json(body)).into_response()
    }
}
