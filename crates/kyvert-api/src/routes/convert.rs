//! # Conversion Route
//!
//! `POST /v1/convert`: accepts a legacy policy document as YAML text and
//! returns the converted `ValidatingPolicy` YAML. Conversion is a pure
//! function, so the handler holds no state and requests need no
//! coordination.

use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Request body: the legacy policy as a YAML string.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub yaml: String,
}

/// Response body: the converted policy as a YAML string.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub converted_yaml: String,
}

pub fn router() -> Router {
    Router::new().route("/v1/convert", post(convert_policy))
}

/// POST /v1/convert — convert one legacy policy document.
async fn convert_policy(
    Json(request): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>, AppError> {
    if request.yaml.trim().is_empty() {
        return Err(AppError::BadRequest("empty policy document".to_string()));
    }
    let converted_yaml = kyvert_compiler::convert(&request.yaml)?;
    Ok(Json(ConvertResponse { converted_yaml }))
}
