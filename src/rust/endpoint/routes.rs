use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::post;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use super::handlers::{analyze, preflight};
use super::state::AppState;

pub const ANALYZE_PATH: &str = "/analyze";

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Builds the router. Every response from the analyze route, preflight and
/// errors included, carries the cross-origin headers.
pub fn app(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route(ANALYZE_PATH, post(analyze).options(preflight))
        .layer(body_limit)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .with_state(state)
}
