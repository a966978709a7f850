use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use log::{debug, info, warn};

use super::error::{ApiError, EMPTY_TEXT_MESSAGE, INVALID_BODY_MESSAGE};
use super::protocol::{AnalyzeRequest, AnalyzeResponse};
use super::state::AppState;
use crate::classifier::EmotionClassifier;

// Handler for scoring a text against every emotion label.
pub async fn analyze(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let started = Instant::now();

    let text = match body.map_err(unreadable_body).and_then(|body| extract_text(&body)) {
        Ok(text) => text,
        Err(err) => {
            info!("analyze rejected: {}", err);
            return Err(err);
        }
    };
    debug!("analyze: {} chars: {:?}", text.chars().count(), text);

    match classify_within_limits(&state, text).await {
        Ok(scores) => {
            info!(
                "analyze ok: {} labels in {:.2?}",
                scores.len(),
                started.elapsed()
            );
            Ok(Json(scores))
        }
        Err(err) => {
            warn!("analyze failed after {:.2?}: {}", started.elapsed(), err);
            Err(err)
        }
    }
}

// Handler for CORS preflight; the headers come from the route layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

// A body that could not be read, e.g. one over the size limit, is still
// answered with the JSON error envelope.
fn unreadable_body(rejection: BytesRejection) -> ApiError {
    ApiError::Validation(rejection.body_text())
}

/// Pulls the text out of a raw request body.
///
/// Anything that is not a JSON object with a non-blank string `text` is a
/// validation error. The text is returned untrimmed.
pub(crate) fn extract_text(body: &[u8]) -> Result<String, ApiError> {
    let request: AnalyzeRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyzeRequest::default()
    } else {
        // Derived struct impls also accept a JSON array, so check for an object first.
        let invalid = || ApiError::Validation(INVALID_BODY_MESSAGE.into());
        match serde_json::from_slice::<serde_json::Value>(body).map_err(|_| invalid())? {
            value @ serde_json::Value::Object(_) => {
                serde_json::from_value(value).map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        }
    };

    match request.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ApiError::Validation(EMPTY_TEXT_MESSAGE.into())),
    }
}

// Runs the classifier under the concurrency limit and request timeout.
//
// The inference runs in its own task holding the semaphore permit, so a
// request that times out keeps its slot until the inference actually ends.
async fn classify_within_limits(state: &AppState, text: String) -> Result<AnalyzeResponse, ApiError> {
    let slots = Arc::clone(&state.inference_slots);
    let classifier = Arc::clone(&state.classifier);
    let request_timeout = state.request_timeout;

    let work = async move {
        let permit = slots
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Inference("classifier is shutting down".into()))?;
        let task = tokio::spawn(async move {
            let _permit = permit;
            classifier.classify(&text).await
        });
        match task.await {
            Ok(result) => result.map_err(ApiError::from),
            Err(join_error) => Err(ApiError::Inference(format!(
                "classifier task failed: {}",
                join_error
            ))),
        }
    };

    tokio::time::timeout(request_timeout, work)
        .await
        .unwrap_or_else(|_| {
            Err(ApiError::Inference(format!(
                "classification timed out after {:?}",
                request_timeout
            )))
        })
}
