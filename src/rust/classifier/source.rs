use std::path::PathBuf;

use log::info;

use super::builder::OnnxClassifierBuilder;
use super::error::ClassifierError;
use super::onnx::OnnxClassifier;
use crate::model_manager::ModelManager;
use crate::models::HubModel;
use crate::runtime::RuntimeConfig;

/// Where an [`OnnxClassifier`] gets its model files from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Download from the Hugging Face hub into the local cache, then load.
    Hub {
        model: HubModel,
        manager: ModelManager,
        /// Discard any cached copy and download again.
        fresh: bool,
    },
    /// Load from a directory that already holds the model files.
    Local { dir: PathBuf },
}

impl ModelSource {
    /// Resolves the source to a local directory, downloading if needed, and
    /// builds the classifier on the blocking pool.
    pub async fn load(
        &self,
        runtime_config: &RuntimeConfig,
        max_sequence_length: usize,
    ) -> Result<OnnxClassifier, ClassifierError> {
        let dir = match self {
            ModelSource::Hub { model, manager, fresh } => {
                if *fresh {
                    info!("Fresh download requested - removing any existing model files...");
                    manager.remove_download(model).await?;
                }
                manager.ensure_model_downloaded(model).await?;
                manager.model_dir(model)
            }
            ModelSource::Local { dir } => dir.clone(),
        };

        info!("Loading classifier from {}", dir.display());
        let runtime_config = runtime_config.clone();
        tokio::task::spawn_blocking(move || {
            OnnxClassifierBuilder::new()
                .with_runtime_config(runtime_config)
                .with_max_sequence_length(max_sequence_length)
                .with_model_dir(&dir)?
                .build()
        })
        .await
        .map_err(|e| ClassifierError::Build(format!("Model loading task failed: {}", e)))?
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            ModelSource::Hub { model, .. } => format!("hub:{}@{}", model.repo_id, model.revision),
            ModelSource::Local { dir } => format!("local:{}", dir.display()),
        }
    }
}
