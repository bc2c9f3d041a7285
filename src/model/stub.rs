//! Test doubles: a whitespace word codec and a model that appends fixed words.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    error::ServiceError,
    model::{CausalLanguageModel, GenerationParams, TokenCodec},
};

pub const EOS: &str = "<eos>";

/// Assigns ids to words on first sight; id 0 is the eos token.
pub struct WordCodec {
    vocab: Mutex<Vec<String>>,
}

impl WordCodec {
    pub fn new() -> Self {
        Self {
            vocab: Mutex::new(vec![EOS.to_string()]),
        }
    }

    pub fn id_of(&self, word: &str) -> u32 {
        let mut vocab = self.vocab.lock();
        if let Some(pos) = vocab.iter().position(|w| w == word) {
            return pos as u32;
        }
        vocab.push(word.to_string());
        (vocab.len() - 1) as u32
    }
}

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>, ServiceError> {
        Ok(text.split_whitespace().map(|w| self.id_of(w)).collect())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, ServiceError> {
        let vocab = self.vocab.lock();
        let mut words = Vec::with_capacity(ids.len());
        for &id in ids {
            let word = vocab
                .get(id as usize)
                .ok_or_else(|| ServiceError::Tokenizer(format!("unknown id {id}")))?;
            if skip_special_tokens && word == EOS {
                continue;
            }
            words.push(word.clone());
        }
        Ok(words.join(" "))
    }

    fn pad_token_id(&self) -> Option<u32> {
        Some(0)
    }

    fn eos_token_id(&self) -> Option<u32> {
        Some(0)
    }
}

/// Echoes the prompt followed by `reply` and eos, recording the params it saw.
pub struct EchoModel {
    reply: Vec<u32>,
    pad_token_id: Option<u32>,
    eos_token_id: Option<u32>,
    pub seen: Mutex<Vec<GenerationParams>>,
}

impl EchoModel {
    pub fn new(codec: &WordCodec, reply: &str) -> Self {
        Self {
            reply: reply.split_whitespace().map(|w| codec.id_of(w)).collect(),
            pad_token_id: None,
            eos_token_id: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Model-side special ids, reported ahead of the codec's.
    pub fn with_special_ids(mut self, pad: Option<u32>, eos: Option<u32>) -> Self {
        self.pad_token_id = pad;
        self.eos_token_id = eos;
        self
    }
}

impl CausalLanguageModel for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    fn pad_token_id(&self) -> Option<u32> {
        self.pad_token_id
    }

    fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    fn generate(
        &self,
        input_ids: &[u32],
        params: &GenerationParams,
    ) -> Result<Vec<Vec<u32>>, ServiceError> {
        self.seen.lock().push(params.clone());
        let mut sequence = input_ids.to_vec();
        sequence.extend_from_slice(&self.reply);
        sequence.push(0);
        Ok(vec![sequence; params.num_return_sequences.max(1)])
    }
}

pub struct FailingModel;

impl CausalLanguageModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn generate(
        &self,
        _input_ids: &[u32],
        _params: &GenerationParams,
    ) -> Result<Vec<Vec<u32>>, ServiceError> {
        Err(ServiceError::Inference("device lost".into()))
    }
}

pub fn echo_backend(reply: &str) -> (Arc<EchoModel>, Arc<WordCodec>) {
    let codec = WordCodec::new();
    let model = EchoModel::new(&codec, reply);
    (Arc::new(model), Arc::new(codec))
}
