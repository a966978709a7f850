//! The HTTP surface: one route that scores text with an injected classifier.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::classifier::EmotionClassifier;

mod error;
mod handlers;
mod protocol;
mod routes;
mod server;
mod state;

pub use error::{ApiError, EMPTY_TEXT_MESSAGE, INVALID_BODY_MESSAGE};
pub use protocol::{AnalyzeRequest, AnalyzeResponse, ErrorResponse};
pub use routes::{app, ALLOW_HEADERS, ALLOW_METHODS, ALLOW_ORIGIN, ANALYZE_PATH};
pub use server::serve;
pub use state::{AppState, EndpointConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT};

/// The emotion-classification endpoint, built around one classifier.
///
/// The classifier is passed in explicitly, so the same endpoint serves an
/// eagerly loaded model, a lazily loaded one, or a test stub.
#[derive(Clone)]
pub struct Endpoint {
    state: AppState,
}

impl Endpoint {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, config: EndpointConfig) -> Self {
        Self {
            state: AppState::new(classifier, &config),
        }
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    /// Handles one request end to end, the way a serverless function would.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        self.router()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
    }
}
