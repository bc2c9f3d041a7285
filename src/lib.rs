pub mod catalog;
pub mod config;
pub mod error;
pub mod generation;
pub mod model;
pub mod postprocess;
pub mod prompt;
pub mod quality;
pub mod server;
pub mod story;

pub use config::AppConfig;
pub use error::ServiceError;
pub use generation::TextGenerator;
pub use model::{CausalLanguageModel, ModelArtifacts, TokenCodec};
pub use postprocess::{PostProcessor, ProcessedStory};
pub use prompt::{PromptEngine, TemplateKind};
pub use quality::{QualityChecker, QualityReport};
pub use server::build_router;
pub use story::{StoryGenerator, StoryRequest, StoryResponse};
