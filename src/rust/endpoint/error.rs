use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::protocol::ErrorResponse;
use crate::classifier::ClassifierError;

pub const EMPTY_TEXT_MESSAGE: &str = "text must not be empty";
pub const INVALID_BODY_MESSAGE: &str = "request body must be a JSON object with a string field \"text\"";

/// The two ways a request can fail.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request itself is unusable (missing, empty or malformed input).
    #[error("{0}")]
    Validation(String),
    /// The classifier failed, timed out or could not be reached.
    #[error("{0}")]
    Inference(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        ApiError::Inference(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
