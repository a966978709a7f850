use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use ort::session::Session;
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use super::error::ClassifierError;
use super::onnx::{OnnxClassifier, Scoring};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// File names expected inside a model directory.
pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";

/// Default truncation length, the usual limit for BERT-style encoders.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;

/// A builder for constructing an [`OnnxClassifier`] with a fluent interface.
#[derive(Default, Debug)]
pub struct OnnxClassifierBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    tokenizer: Option<Tokenizer>,
    session: Option<Session>,
    labels: Option<Vec<String>>,
    scoring: Option<Scoring>,
    max_sequence_length: Option<usize>,
    runtime_config: RuntimeConfig,
}

/// The subset of a transformers `config.json` the classifier needs.
#[derive(Debug, Default, Deserialize)]
struct ModelConfigJson {
    #[serde(default)]
    id2label: HashMap<String, String>,
    #[serde(default)]
    num_labels: Option<usize>,
    #[serde(default)]
    problem_type: Option<String>,
}

impl OnnxClassifierBuilder {
    /// Creates a new empty builder with the default runtime configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before the model is loaded to take effect.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Sets how many tokens are kept before truncation (default 512).
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = Some(max_sequence_length);
        self
    }

    /// Loads `model.onnx`, `tokenizer.json` and `config.json` from a directory.
    ///
    /// A missing `config.json` is tolerated; labels then fall back to `LABEL_<i>`.
    pub fn with_model_dir(self, dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ClassifierError::Build(format!(
                "Model directory not found: {}",
                dir.display()
            )));
        }
        let config_path = dir.join(CONFIG_FILE);
        let config_path = config_path.exists().then_some(config_path);
        self.with_files(dir.join(MODEL_FILE), dir.join(TOKENIZER_FILE), config_path)
    }

    /// Loads the model, tokenizer and optional model config from explicit paths.
    ///
    /// # Errors
    /// - The paths are already set
    /// - A file does not exist
    /// - The tokenizer, model or config failed to load
    /// - The model does not declare `input_ids` and `attention_mask` inputs
    pub fn with_files(
        mut self,
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ClassifierError> {
        if self.model_path.is_some() || self.tokenizer_path.is_some() {
            return Err(ClassifierError::Build("Model and tokenizer paths already set".to_string()));
        }
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            return Err(ClassifierError::Build(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::Build(format!(
                "Tokenizer file not found: {}",
                tokenizer_path.display()
            )));
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::Build(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("Tokenizer loaded from {}", tokenizer_path.display());

        let session = create_session_builder(&self.runtime_config)?.commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        if let Some(config_path) = config_path {
            let raw = fs::read_to_string(&config_path).map_err(|e| {
                ClassifierError::Build(format!(
                    "Failed to read model config {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            let (labels, scoring) = parse_model_config(&raw)?;
            self.labels = labels;
            self.scoring = Some(scoring);
        } else {
            warn!("No model config supplied; label names will be generic");
        }

        self.model_path = Some(model_path.to_path_buf());
        self.tokenizer_path = Some(tokenizer_path.to_path_buf());
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        Ok(self)
    }

    /// Builds and returns the final classifier.
    ///
    /// When the model config carries no labels, the label count is inferred
    /// by running a probe input through the model.
    pub fn build(mut self) -> Result<OnnxClassifier, ClassifierError> {
        let (model_path, tokenizer_path) = match (self.model_path.take(), self.tokenizer_path.take()) {
            (Some(model), Some(tokenizer)) => (model, tokenizer),
            _ => {
                return Err(ClassifierError::Build(
                    "Model and tokenizer paths must be set".to_string(),
                ))
            }
        };
        let mut tokenizer = self
            .tokenizer
            .take()
            .ok_or_else(|| ClassifierError::Build("No tokenizer loaded".into()))?;
        let session = self
            .session
            .take()
            .ok_or_else(|| ClassifierError::Build("No ONNX model loaded".into()))?;

        let max_sequence_length = self.max_sequence_length.unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH);
        if max_sequence_length == 0 {
            return Err(ClassifierError::Validation(
                "Max sequence length must be greater than zero".into(),
            ));
        }
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::Tokenizer(format!("Failed to configure truncation: {}", e)))?;

        let uses_token_type_ids = session.inputs.iter().any(|input| input.name == "token_type_ids");

        let mut classifier = OnnxClassifier {
            model_path: model_path.to_string_lossy().to_string(),
            tokenizer_path: tokenizer_path.to_string_lossy().to_string(),
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            labels: Arc::new(self.labels.take().unwrap_or_default()),
            scoring: self.scoring.unwrap_or(Scoring::Softmax),
            max_sequence_length,
            uses_token_type_ids,
        };

        if classifier.labels.is_empty() {
            let logits = classifier.run_model("Texto de prueba para inferir las etiquetas")?;
            info!("Inferred {} labels from model output", logits.len());
            classifier.labels = Arc::new(generic_labels(logits.len()));
        }
        if classifier.labels.is_empty() {
            return Err(ClassifierError::Build("Model exposes no labels".into()));
        }

        info!(
            "Classifier ready with {} labels: {:?}",
            classifier.labels.len(),
            classifier.labels
        );
        Ok(classifier)
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        for required in ["input_ids", "attention_mask"] {
            if !session.inputs.iter().any(|input| input.name == required) {
                let found: Vec<_> = session.inputs.iter().map(|input| input.name.as_str()).collect();
                return Err(ClassifierError::Model(format!(
                    "Model must have an '{}' input, found {:?}",
                    required, found
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::Model(
                "Model must have at least 1 output for logits".to_string(),
            ));
        }

        Ok(())
    }
}

fn generic_labels(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("LABEL_{}", i)).collect()
}

/// Extracts the ordered label table and scoring rule from a model `config.json`.
///
/// Labels are ordered by class id. Gaps in `id2label` are filled with
/// `LABEL_<i>`, as is the whole table when only `num_labels` is given.
pub(crate) fn parse_model_config(raw: &str) -> Result<(Option<Vec<String>>, Scoring), ClassifierError> {
    let config: ModelConfigJson = serde_json::from_str(raw)
        .map_err(|e| ClassifierError::Build(format!("Invalid model config: {}", e)))?;

    let scoring = match config.problem_type.as_deref() {
        Some("multi_label_classification") => Scoring::Sigmoid,
        _ => Scoring::Softmax,
    };

    if config.id2label.is_empty() {
        return Ok((config.num_labels.map(generic_labels), scoring));
    }

    let mut by_id = Vec::with_capacity(config.id2label.len());
    for (id, label) in config.id2label {
        let id: usize = id
            .parse()
            .map_err(|_| ClassifierError::Build(format!("Invalid class id '{}' in id2label", id)))?;
        by_id.push((id, label));
    }
    by_id.sort_by_key(|(id, _)| *id);

    let count = by_id
        .last()
        .map(|(id, _)| id + 1)
        .unwrap_or(0)
        .max(config.num_labels.unwrap_or(0));
    let mut labels = generic_labels(count);
    for (id, label) in by_id {
        labels[id] = label;
    }

    Ok((Some(labels), scoring))
}
