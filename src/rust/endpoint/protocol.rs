use serde::{Deserialize, Serialize};

use crate::classifier::LabelScore;

// Request payload for emotion analysis. `text` is optional at the wire level
// so a missing field is reported as a validation error, not a parse error.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<String>,
}

// Successful response: every label the model knows, with its score.
pub type AnalyzeResponse = Vec<LabelScore>;

// Error envelope for JSON responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
