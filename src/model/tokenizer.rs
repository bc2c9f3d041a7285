use std::path::Path;

use tokenizers::Tokenizer;

use crate::{error::ServiceError, model::TokenCodec};

const EOS_CANDIDATES: &[&str] = &["</s>", "<|endoftext|>", "<eos>", "<|eos|>"];

/// A Hugging Face `tokenizer.json` with its pad and eos ids resolved once.
pub struct HfTokenizer {
    inner: Tokenizer,
    pad_token_id: Option<u32>,
    eos_token_id: Option<u32>,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::Configuration(format!(
                "tokenizer artifact missing: {}",
                path.display()
            )));
        }
        let inner = Tokenizer::from_file(path).map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        Ok(Self::new(inner))
    }

    pub fn new(inner: Tokenizer) -> Self {
        let eos_token_id = EOS_CANDIDATES
            .iter()
            .find_map(|token| inner.token_to_id(token));
        // Models without a pad token pad with eos.
        let pad_token_id = inner
            .get_padding()
            .map(|padding| padding.pad_id)
            .or(eos_token_id);

        Self {
            inner,
            pad_token_id,
            eos_token_id,
        }
    }
}

impl TokenCodec for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ServiceError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, ServiceError> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))
    }

    fn pad_token_id(&self) -> Option<u32> {
        self.pad_token_id
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }
}
