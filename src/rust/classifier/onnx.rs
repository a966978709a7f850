use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::utils::{sigmoid, softmax, sort_descending};
use super::{EmotionClassifier, LabelScore};

/// How raw logits become scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    /// One label per input; scores sum to one.
    Softmax,
    /// Independent labels; each score is its own probability.
    Sigmoid,
}

/// A thread-safe emotion classifier running a sequence-classification ONNX export.
///
/// # Thread Safety
///
/// This type is `Send + Sync` and cheap to clone: the tokenizer, the session
/// and the label table live behind `Arc`. ONNX Runtime sessions accept
/// concurrent `run` calls, so clones may classify in parallel.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use emotive::{EmotionClassifier, OnnxClassifier};
///
/// let classifier = OnnxClassifier::builder()
///     .with_model_dir("models/xlnet-emotion-classifier-es")?
///     .build()?;
///
/// for score in classifier.classify("Estoy muy feliz hoy").await? {
///     println!("{}: {:.3}", score.label, score.score);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OnnxClassifier {
    pub model_path: String,
    pub tokenizer_path: String,
    pub tokenizer: Arc<Tokenizer>,
    pub session: Arc<Session>,
    pub labels: Arc<Vec<String>>,
    pub scoring: Scoring,
    pub max_sequence_length: usize,
    pub(crate) uses_token_type_ids: bool,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxClassifier>();
    }
};

/// Summary of a loaded classifier, used for logging and the CLI.
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    pub model_path: String,
    pub tokenizer_path: String,
    pub num_labels: usize,
    pub labels: Vec<String>,
    pub scoring: Scoring,
    pub max_sequence_length: usize,
}

impl OnnxClassifier {
    /// Creates a new OnnxClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::OnnxClassifierBuilder {
        super::builder::OnnxClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            model_path: self.model_path.clone(),
            tokenizer_path: self.tokenizer_path.clone(),
            num_labels: self.labels.len(),
            labels: self.labels.as_ref().clone(),
            scoring: self.scoring,
            max_sequence_length: self.max_sequence_length,
        }
    }

    /// Counts the tokens the model will see for `text`, after truncation.
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))
            .map(|encoding| encoding.get_ids().len())
    }

    /// Scores `text` against every label, highest score first.
    ///
    /// This runs inference on the calling thread. Async callers should go
    /// through [`EmotionClassifier::classify`], which moves the work onto the
    /// blocking pool.
    ///
    /// # Errors
    /// - `Validation` if the text is empty or tokenizes to nothing
    /// - `Tokenizer` if the text cannot be encoded
    /// - `Model` if tensor creation or the model run fails
    /// - `Prediction` if the logits do not match the label table
    pub fn predict(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::Validation("Input text cannot be empty".into()));
        }

        let logits = self.run_model(text)?;
        if logits.len() != self.labels.len() {
            return Err(ClassifierError::Prediction(format!(
                "Model produced {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        let probabilities = match self.scoring {
            Scoring::Softmax => softmax(logits.view()),
            Scoring::Sigmoid => sigmoid(logits.view()),
        };

        let mut scores: Vec<LabelScore> = self
            .labels
            .iter()
            .zip(probabilities.iter())
            .map(|(label, &score)| LabelScore::new(label.clone(), score))
            .collect();
        sort_descending(&mut scores);

        Ok(scores)
    }

    /// Runs the model on one text and returns the raw logits for the batch of one.
    pub(crate) fn run_model(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let token_len = encoding.get_ids().len();
        if token_len == 0 {
            return Err(ClassifierError::Validation("Input text produced no tokens".into()));
        }

        let to_tensor = |name: &str, values: &[u32]| -> Result<Tensor<i64>, ClassifierError> {
            let array = Array2::from_shape_vec(
                (1, token_len),
                values.iter().map(|&x| x as i64).collect(),
            )
            .map_err(|e| ClassifierError::Model(format!("Failed to create {} array: {}", name, e)))?;
            Tensor::from_array(array)
                .map_err(|e| ClassifierError::Model(format!("Failed to create {} tensor: {}", name, e)))
        };

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", to_tensor("input_ids", encoding.get_ids())?);
        input_tensors.insert(
            "attention_mask",
            to_tensor("attention_mask", encoding.get_attention_mask())?,
        );
        if self.uses_token_type_ids {
            input_tensors.insert(
                "token_type_ids",
                to_tensor("token_type_ids", encoding.get_type_ids())?,
            );
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::Model(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Model(format!("Failed to extract output tensor: {}", e)))?;

        // Logits are [batch=1, num_labels]; some exports drop the batch axis.
        let shape = output_tensor.shape().to_vec();
        match shape.as_slice() {
            [1, _] | [_] => Ok(output_tensor.iter().cloned().collect()),
            other => Err(ClassifierError::Prediction(format!(
                "Unexpected logits shape {:?}, expected [1, num_labels]",
                other
            ))),
        }
    }
}

#[async_trait]
impl EmotionClassifier for OnnxClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
        let classifier = self.clone();
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || classifier.predict(&text))
            .await
            .map_err(|e| ClassifierError::Prediction(format!("Inference task failed: {}", e)))?
    }

    fn labels(&self) -> Option<Vec<String>> {
        Some(self.labels.as_ref().clone())
    }
}
