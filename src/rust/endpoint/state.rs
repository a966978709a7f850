use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::classifier::EmotionClassifier;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Limits applied to every classification request.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Upper bound on queueing plus inference for one request.
    pub request_timeout: Duration,
    /// How many inferences may run at the same time.
    pub max_concurrency: usize,
    /// Largest request body read before answering with a validation error.
    pub max_body_bytes: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl EndpointConfig {
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

// Application state shared by the handlers.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn EmotionClassifier>,
    pub inference_slots: Arc<Semaphore>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Arc<dyn EmotionClassifier>, config: &EndpointConfig) -> Self {
        Self {
            classifier,
            inference_slots: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            request_timeout: config.request_timeout,
            max_body_bytes: config.max_body_bytes,
        }
    }
}
