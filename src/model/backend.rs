use crate::{error::ServiceError, model::GenerationParams};

/// Text to token-id conversion plus the special ids a generator needs.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ServiceError>;

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, ServiceError>;

    fn pad_token_id(&self) -> Option<u32>;

    fn eos_token_id(&self) -> Option<u32>;
}

/// A pretrained causal language model.
///
/// `generate` returns one full token sequence (prompt included) per requested
/// return sequence.
pub trait CausalLanguageModel: Send + Sync {
    fn name(&self) -> &str;

    fn pad_token_id(&self) -> Option<u32> {
        None
    }

    fn eos_token_id(&self) -> Option<u32> {
        None
    }

    fn generate(
        &self,
        input_ids: &[u32],
        params: &GenerationParams,
    ) -> Result<Vec<Vec<u32>>, ServiceError>;
}
