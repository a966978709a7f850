use ort::Error as OrtError;

/// Represents the different types of errors that can occur while loading or running the classifier.
///
/// The `Display` text is what callers of the HTTP endpoint see on a failed classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierError {
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    Model(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    Build(String),
    /// Error occurred while making predictions
    #[error("Prediction error: {0}")]
    Prediction(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    Validation(String),
    /// Error occurred while fetching model files from the hub
    #[error("Download error: {0}")]
    Download(String),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::Build(err.to_string())
    }
}

impl From<crate::model_manager::ModelError> for ClassifierError {
    fn from(err: crate::model_manager::ModelError) -> Self {
        ClassifierError::Download(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_kind() {
        let err = ClassifierError::Model("Failed to run model: out of memory".into());
        assert_eq!(err.to_string(), "Model error: Failed to run model: out of memory");

        let err = ClassifierError::Validation("Input text cannot be empty".into());
        assert_eq!(err.to_string(), "Validation error: Input text cannot be empty");
    }

    #[test]
    fn test_model_error_converts_to_download() {
        let err: ClassifierError = crate::model_manager::ModelError::VerificationFailed.into();
        assert!(matches!(err, ClassifierError::Download(_)));
        assert!(err.to_string().starts_with("Download error:"));
    }
}
