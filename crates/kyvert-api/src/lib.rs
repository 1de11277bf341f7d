//! # kyvert-api — Policy Conversion Service
//!
//! Thin axum boundary around the pure conversion core.
//!
//! ## API Surface
//!
//! | Route               | Module              | Purpose                      |
//! |---------------------|---------------------|------------------------------|
//! | `POST /v1/convert`  | [`routes::convert`] | Legacy → ValidatingPolicy    |
//! | `GET /health/*`     | (here)              | Liveness/readiness probes    |
//!
//! ## Configuration
//!
//! - `KYVERT_ADDR` — listen address (default `0.0.0.0:8080`).
//! - `KYVERT_ALLOWED_ORIGIN` — CORS origin for the browser frontend
//!   (default `http://localhost:5173`, the Vite dev server).

pub mod error;
pub mod routes;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default CORS origin: the local frontend dev server.
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// The CORS origin the frontend is served from, from
/// `KYVERT_ALLOWED_ORIGIN` or the default.
fn allowed_origin() -> HeaderValue {
    let configured =
        std::env::var("KYVERT_ALLOWED_ORIGIN").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.to_string());
    match configured.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(origin = %configured, "invalid KYVERT_ALLOWED_ORIGIN, using default");
            HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN)
        }
    }
}

/// Assemble the application router.
///
/// Health probes are mounted alongside the API; the service is stateless,
/// so no auth or shared state layers are needed.
pub fn app() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes::convert::router())
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Conversion is a pure function with no dependencies to
/// check, so readiness follows liveness.
async fn readiness() -> &'static str {
    "ready"
}
