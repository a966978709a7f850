#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use emotive::{ClassifierError, EmotionClassifier, Endpoint, EndpointConfig, LabelScore};
use tower::ServiceExt;

pub const EMOTIONS: [&str; 7] = ["joy", "sadness", "anger", "fear", "surprise", "disgust", "others"];

/// Returns the same scores for every input.
pub struct FixedClassifier(pub Vec<LabelScore>);

#[async_trait]
impl EmotionClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        Ok(self.0.clone())
    }
}

/// Derives a deterministic distribution over all emotions from the text.
pub struct DeterministicClassifier;

#[async_trait]
impl EmotionClassifier for DeterministicClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        let seed = text.chars().map(|c| c as u32 as usize).sum::<usize>();
        let weights: Vec<f32> = (0..EMOTIONS.len())
            .map(|i| ((seed + i * 31) % 17 + 1) as f32)
            .collect();
        let total: f32 = weights.iter().sum();
        Ok(EMOTIONS
            .iter()
            .zip(weights)
            .map(|(label, weight)| LabelScore::new(*label, weight / total))
            .collect())
    }

    fn labels(&self) -> Option<Vec<String>> {
        Some(EMOTIONS.iter().map(|l| l.to_string()).collect())
    }
}

/// Fails every call with the given error.
pub struct FailingClassifier(pub ClassifierError);

#[async_trait]
impl EmotionClassifier for FailingClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        Err(self.0.clone())
    }
}

/// Panics inside the inference call.
pub struct PanickingClassifier;

#[async_trait]
impl EmotionClassifier for PanickingClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        panic!("inference runtime crashed");
    }
}

/// Sleeps before answering and records how many calls overlap.
#[derive(Default)]
pub struct SlowClassifier {
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl SlowClassifier {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EmotionClassifier for SlowClassifier {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![LabelScore::new("joy", 1.0)])
    }
}

pub fn joy_scores() -> Vec<LabelScore> {
    vec![
        LabelScore::new("joy", 0.91),
        LabelScore::new("sadness", 0.02),
        LabelScore::new("anger", 0.02),
        LabelScore::new("fear", 0.02),
        LabelScore::new("surprise", 0.03),
    ]
}

pub fn build_app(classifier: impl EmotionClassifier + 'static) -> Router {
    build_app_with_config(classifier, EndpointConfig::default())
}

pub fn build_app_with_config(classifier: impl EmotionClassifier + 'static, config: EndpointConfig) -> Router {
    Endpoint::new(Arc::new(classifier), config).router()
}

pub fn post_analyze(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("expected request to build")
}

pub fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("expected request to build")
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("expected response body");
    (status, headers, body)
}

pub fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("expected json body")
}

pub fn assert_cors_headers(headers: &HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
}
