//! The classification capability the HTTP endpoint delegates to.
//!
//! [`EmotionClassifier`] is the single seam between the endpoint and whatever
//! produces scores. [`OnnxClassifier`] runs a sequence-classification export
//! in-process, [`LazyClassifier`] defers loading it until the first request,
//! and tests inject deterministic stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod builder;
mod error;
mod lazy;
mod onnx;
mod source;
pub(crate) mod utils;

pub use builder::{
    OnnxClassifierBuilder, CONFIG_FILE, DEFAULT_MAX_SEQUENCE_LENGTH, MODEL_FILE, TOKENIZER_FILE,
};
pub use error::ClassifierError;
pub use lazy::LazyClassifier;
pub use onnx::{ClassifierInfo, OnnxClassifier, Scoring};
pub use source::ModelSource;

/// One emotion label with the model's confidence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Maps input text to a score for every label in the model's taxonomy.
///
/// Implementations must return all labels, not only the best match. The
/// order of the returned scores is the implementation's choice and is passed
/// through to callers untouched.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError>;

    /// The label taxonomy, when it is known without running inference.
    fn labels(&self) -> Option<Vec<String>> {
        None
    }
}

#[async_trait]
impl<T: EmotionClassifier + ?Sized> EmotionClassifier for Arc<T> {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        (**self).classify(text).await
    }

    fn labels(&self) -> Option<Vec<String>> {
        (**self).labels()
    }
}
