mod backend;
mod loader;
pub mod sampling;
mod tokenizer;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

#[cfg(test)]
pub(crate) mod stub;

pub use backend::{CausalLanguageModel, TokenCodec};
pub use loader::ModelArtifacts;
pub use tokenizer::HfTokenizer;
pub use types::{GeneratedText, GenerationOverrides, GenerationParams};
