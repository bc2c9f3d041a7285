use std::sync::Arc;

use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{CausalLanguageModel, HfTokenizer, TokenCodec},
};

/// Model and tokenizer loaded once at startup and shared read-only.
pub struct ModelArtifacts {
    pub tokenizer: Arc<dyn TokenCodec>,
    pub model: Arc<dyn CausalLanguageModel>,
}

impl ModelArtifacts {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        let tokenizer: Arc<dyn TokenCodec> =
            Arc::new(HfTokenizer::from_file(config.tokenizer_path.as_path())?);
        let model = load_model(config)?;
        info!(model = model.name(), "model artifacts loaded");
        Ok(Self { tokenizer, model })
    }
}

#[cfg(feature = "tch-backend")]
fn load_model(config: &AppConfig) -> Result<Arc<dyn CausalLanguageModel>, ServiceError> {
    let model = crate::model::tch_backend::TorchScriptModel::load(&config.model_path, config.device)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "tch-backend"))]
fn load_model(config: &AppConfig) -> Result<Arc<dyn CausalLanguageModel>, ServiceError> {
    Err(ServiceError::Configuration(format!(
        "cannot load {}: built without the `tch-backend` feature",
        config.model_path.display()
    )))
}
