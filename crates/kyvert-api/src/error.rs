//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Converter diagnostics map to 422 with the converter's own error code
//! (`PARSE_ERROR`, `UNSUPPORTED_CONSTRUCT`, `CONVERSION_ERROR`) and the
//! offending field path, so a client can point at the exact construct.
//! Internal error details are never exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kyvert_core::ConvertError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. `PARSE_ERROR`).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Source-document field path of the offending construct, when the
    /// error points at one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// The policy could not be converted (422). Carries the converter's
    /// structured diagnostic.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// Request body could not be used (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500). Message is logged but not returned
    /// to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &str) {
        match self {
            Self::Convert(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.code()),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn field_path(&self) -> Option<String> {
        match self {
            Self::Convert(err) => err.field_path().map(ToString::to_string),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let code = code.to_string();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Convert(_) => tracing::debug!(error = %self, "conversion rejected"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                path: self.field_path(),
            },
        };

        (status, Json(body)).into_response()
    }
}
