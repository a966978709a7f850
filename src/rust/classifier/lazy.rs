use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::OnceCell;

use super::error::ClassifierError;
use super::onnx::OnnxClassifier;
use super::source::ModelSource;
use super::{EmotionClassifier, LabelScore};
use crate::runtime::RuntimeConfig;

/// Loads its model on the first classification instead of at startup.
///
/// This is the serverless-style strategy: process start stays cheap and the
/// first request pays for the download and load. Concurrent first requests
/// share one load. A failed load fails only the requests waiting on it; the
/// next request tries again.
#[derive(Debug)]
pub struct LazyClassifier {
    source: ModelSource,
    runtime_config: RuntimeConfig,
    max_sequence_length: usize,
    loaded: OnceCell<OnnxClassifier>,
}

impl LazyClassifier {
    pub fn new(source: ModelSource, runtime_config: RuntimeConfig, max_sequence_length: usize) -> Self {
        Self {
            source,
            runtime_config,
            max_sequence_length,
            loaded: OnceCell::new(),
        }
    }

    /// Whether the model has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Returns the loaded classifier, loading it on first use.
    pub async fn get(&self) -> Result<&OnnxClassifier, ClassifierError> {
        self.loaded
            .get_or_try_init(|| async {
                info!("First request: loading model from {}", self.source.describe());
                self.source
                    .load(&self.runtime_config, self.max_sequence_length)
                    .await
                    .inspect_err(|e| warn!("Lazy model load failed, will retry on next request: {}", e))
            })
            .await
    }
}

#[async_trait]
impl EmotionClassifier for LazyClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        self.get().await?.classify(text).await
    }

    fn labels(&self) -> Option<Vec<String>> {
        self.loaded.get().and_then(|classifier| classifier.labels())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn missing_model() -> LazyClassifier {
        LazyClassifier::new(
            ModelSource::Local {
                dir: PathBuf::from("/nonexistent/emotive/lazy"),
            },
            RuntimeConfig::default(),
            128,
        )
    }

    #[tokio::test]
    async fn test_not_loaded_until_first_request() {
        let classifier = missing_model();
        assert!(!classifier.is_loaded());
        assert!(classifier.labels().is_none());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let classifier = missing_model();

        let first = classifier.classify("hola").await;
        assert!(matches!(first, Err(ClassifierError::Build(_))));
        assert!(!classifier.is_loaded());

        // The failure is not cached; the second call attempts the load again.
        let second = classifier.classify("hola").await;
        assert!(matches!(second, Err(ClassifierError::Build(_))));
        assert!(!classifier.is_loaded());
    }
}
