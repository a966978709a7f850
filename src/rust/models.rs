use std::env;

use crate::classifier::{CONFIG_FILE, MODEL_FILE, TOKENIZER_FILE};

/// Hub repository of the Spanish emotion classifier served by default.
pub const DEFAULT_REPO_ID: &str = "matiasrodriguezc/xlnet-emotion-classifier-es";
pub const DEFAULT_REVISION: &str = "main";
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

/// A sequence-classification model published on the Hugging Face hub.
///
/// The repository must carry an ONNX export next to its tokenizer and
/// config. `model_file` may point into a subdirectory (e.g. `onnx/model.onnx`);
/// locally every file is stored flat under the model's cache directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubModel {
    pub repo_id: String,
    pub revision: String,
    pub model_file: String,
    pub tokenizer_file: String,
    pub config_file: String,
}

impl Default for HubModel {
    fn default() -> Self {
        Self::new(DEFAULT_REPO_ID)
    }
}

impl HubModel {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: DEFAULT_REVISION.to_string(),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            config_file: "config.json".to_string(),
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_model_file(mut self, model_file: impl Into<String>) -> Self {
        self.model_file = model_file.into();
        self
    }

    /// Directory name used for this model in the local cache.
    pub fn cache_name(&self) -> String {
        self.repo_id.replace('/', "--")
    }

    /// Download URL of a file in the repository at the pinned revision.
    ///
    /// Honors `HF_ENDPOINT` for mirrors.
    pub fn file_url(&self, file: &str) -> String {
        let endpoint = env::var("HF_ENDPOINT").unwrap_or_else(|_| DEFAULT_HUB_ENDPOINT.to_string());
        self.file_url_at(&endpoint, file)
    }

    /// Download URL of a file served by a specific hub endpoint.
    pub fn file_url_at(&self, endpoint: &str, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            endpoint.trim_end_matches('/'),
            self.repo_id,
            self.revision,
            file
        )
    }

    /// Remote files paired with the flat local names they are stored under.
    pub fn files(&self) -> [(&str, &'static str); 3] {
        [
            (self.model_file.as_str(), MODEL_FILE),
            (self.tokenizer_file.as_str(), TOKENIZER_FILE),
            (self.config_file.as_str(), CONFIG_FILE),
        ]
    }
}
