//! An HTTP endpoint that scores Spanish text against a fixed set of emotion labels.
//!
//! The endpoint delegates every request to an injected [`EmotionClassifier`].
//! [`OnnxClassifier`] runs a sequence-classification ONNX export in-process;
//! [`ModelSource`] fetches one from the Hugging Face hub or a local directory,
//! and [`LazyClassifier`] postpones that work until the first request.
//!
//! # Basic Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use emotive::{Endpoint, EndpointConfig, HubModel, ModelManager, ModelSource, RuntimeConfig};
//! use std::sync::Arc;
//!
//! let source = ModelSource::Hub {
//!     model: HubModel::default(),
//!     manager: ModelManager::new_default()?,
//!     fresh: false,
//! };
//! let classifier = source.load(&RuntimeConfig::default(), 512).await?;
//!
//! let endpoint = Endpoint::new(Arc::new(classifier), EndpointConfig::default());
//! emotive::serve(endpoint, "0.0.0.0:8000".parse()?).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Testing with a stub
//!
//! ```rust
//! use async_trait::async_trait;
//! use emotive::{ClassifierError, EmotionClassifier, Endpoint, EndpointConfig, LabelScore};
//! use std::sync::Arc;
//!
//! struct AlwaysJoy;
//!
//! #[async_trait]
//! impl EmotionClassifier for AlwaysJoy {
//!     async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, ClassifierError> {
//!         Ok(vec![LabelScore::new("joy", 1.0)])
//!     }
//! }
//!
//! let endpoint = Endpoint::new(Arc::new(AlwaysJoy), EndpointConfig::default());
//! let _router = endpoint.router();
//! ```

pub mod classifier;
pub mod endpoint;
pub mod model_manager;
pub mod models;
mod runtime;

pub use classifier::{
    ClassifierError, ClassifierInfo, EmotionClassifier, LabelScore, LazyClassifier, ModelSource,
    OnnxClassifier, OnnxClassifierBuilder, Scoring,
};
pub use endpoint::{serve, ApiError, Endpoint, EndpointConfig};
pub use model_manager::{ModelError, ModelManager};
pub use models::HubModel;
pub use runtime::{create_session_builder, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}
