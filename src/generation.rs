//! Prompt-to-text generation on top of an injected model and tokenizer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    model::{
        CausalLanguageModel, GeneratedText, GenerationOverrides, GenerationParams, ModelArtifacts,
        TokenCodec,
    },
};

const PROMPT_TAIL_CHARS: usize = 10;
const SEARCH_SLACK_CHARS: usize = 200;
const VARIATION_BASE_SEED: u64 = 42;

#[derive(Clone, Default)]
pub struct TextGenerator {
    model: Option<Arc<dyn CausalLanguageModel>>,
    tokenizer: Option<Arc<dyn TokenCodec>>,
    defaults: GenerationParams,
}

impl TextGenerator {
    /// A generator with no model attached; every generation call fails with
    /// a configuration error until built with [`TextGenerator::with_backend`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(
        model: Arc<dyn CausalLanguageModel>,
        tokenizer: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            model: Some(model),
            tokenizer: Some(tokenizer),
            defaults: GenerationParams::default(),
        }
    }

    pub fn from_artifacts(artifacts: ModelArtifacts) -> Self {
        Self::with_backend(artifacts.model, artifacts.tokenizer)
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some() && self.tokenizer.is_some()
    }

    /// Generates from `prompt`. The decoded text still contains the prompt;
    /// see [`extract_completion`].
    pub fn generate_text(
        &self,
        prompt: &str,
        overrides: Option<&GenerationOverrides>,
    ) -> Result<GeneratedText, ServiceError> {
        let (Some(model), Some(tokenizer)) = (self.model.as_ref(), self.tokenizer.as_ref()) else {
            return Err(ServiceError::Configuration(
                "model and tokenizer must be set before generation".into(),
            ));
        };

        let mut params = match overrides {
            Some(overrides) => overrides.merge_into(self.defaults.clone()),
            None => self.defaults.clone(),
        };
        params.pad_token_id = model.pad_token_id().or_else(|| tokenizer.pad_token_id());
        params.eos_token_id = model.eos_token_id().or_else(|| tokenizer.eos_token_id());

        let input_ids = tokenizer.encode(prompt)?;
        debug!(
            prompt_tokens = input_ids.len(),
            ?params,
            model = model.name(),
            "generating text"
        );

        let sequences = model.generate(&input_ids, &params)?;
        let mut decoded = sequences
            .iter()
            .map(|ids| tokenizer.decode(ids, true))
            .collect::<Result<Vec<_>, _>>()?;

        if params.num_return_sequences > 1 {
            Ok(GeneratedText::Multiple(decoded))
        } else if decoded.is_empty() {
            Err(ServiceError::Inference("model returned no sequences".into()))
        } else {
            Ok(GeneratedText::Single(decoded.swap_remove(0)))
        }
    }

    pub fn extract_completion(&self, full_text: &str, prompt: &str) -> String {
        extract_completion(full_text, prompt)
    }

    /// One completion per variation, each sampled with seed `42 + index`.
    pub fn generate_multiple_variations(
        &self,
        prompt: &str,
        num_variations: usize,
        overrides: Option<&GenerationOverrides>,
    ) -> Result<Vec<String>, ServiceError> {
        let mut params = overrides.cloned().unwrap_or_default();
        params.num_return_sequences = Some(1);

        let mut variations = Vec::with_capacity(num_variations);
        for index in 0..num_variations {
            params.seed = Some(VARIATION_BASE_SEED + index as u64);
            let full_text = self.generate_text(prompt, Some(&params))?.into_first();
            variations.push(extract_completion(&full_text, prompt));
        }
        Ok(variations)
    }
}

/// Best-effort removal of the echoed prompt from generated text.
///
/// Tries an exact prefix match first, then looks for the last
/// `PROMPT_TAIL_CHARS` characters of the prompt near the start of the output.
/// Returns `full_text` unchanged when neither matches.
pub fn extract_completion(full_text: &str, prompt: &str) -> String {
    if let Some(rest) = full_text.strip_prefix(prompt) {
        return rest.trim().to_string();
    }

    let tail = char_suffix(prompt, PROMPT_TAIL_CHARS);
    let window_end = byte_offset_of_char(full_text, prompt.chars().count() + SEARCH_SLACK_CHARS);
    if !tail.trim().is_empty() {
        if let Some(start) = full_text[..window_end].find(tail) {
            return full_text[start + tail.len()..].trim().to_string();
        }
    }

    warn!("could not locate prompt in generated text, returning full output");
    full_text.to_string()
}

fn char_suffix(text: &str, chars: usize) -> &str {
    match text.char_indices().rev().nth(chars.saturating_sub(1)) {
        Some((idx, _)) if chars > 0 => &text[idx..],
        _ if chars == 0 => "",
        _ => text,
    }
}

fn byte_offset_of_char(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stub::{EchoModel, FailingModel, WordCodec, echo_backend};

    #[test]
    fn generation_without_backend_is_a_configuration_error() {
        let generator = TextGenerator::new();
        assert!(!generator.is_ready());
        let err = generator.generate_text("Once upon a time,", None).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn stub_model_tokens_come_back_decoded() {
        let (model, codec) = echo_backend("the moon smiled");
        let generator = TextGenerator::with_backend(model.clone(), codec);
        let text = generator
            .generate_text("Once upon a time,", None)
            .unwrap()
            .into_first();
        assert_eq!(text, "Once upon a time, the moon smiled");

        let seen = model.seen.lock();
        assert_eq!(seen[0].max_new_tokens, 200);
        assert_eq!(seen[0].eos_token_id, Some(0));
        assert_eq!(seen[0].pad_token_id, Some(0));
    }

    #[test]
    fn model_special_ids_take_precedence_over_tokenizer() {
        let codec = Arc::new(WordCodec::new());
        let model = Arc::new(EchoModel::new(&codec, "hush").with_special_ids(Some(7), Some(9)));
        let generator = TextGenerator::with_backend(model.clone(), codec);
        generator.generate_text("night night", None).unwrap();

        let seen = model.seen.lock();
        assert_eq!(seen[0].pad_token_id, Some(7));
        assert_eq!(seen[0].eos_token_id, Some(9));
    }

    #[test]
    fn model_without_pad_falls_back_to_tokenizer_pad() {
        let codec = Arc::new(WordCodec::new());
        let model = Arc::new(EchoModel::new(&codec, "hush").with_special_ids(None, Some(9)));
        let generator = TextGenerator::with_backend(model.clone(), codec);
        generator.generate_text("night night", None).unwrap();

        let seen = model.seen.lock();
        assert_eq!(seen[0].pad_token_id, Some(0));
        assert_eq!(seen[0].eos_token_id, Some(9));
    }

    #[test]
    fn overrides_reach_the_model() {
        let (model, codec) = echo_backend("hello");
        let generator = TextGenerator::with_backend(model.clone(), codec);
        let overrides = GenerationOverrides {
            max_new_tokens: Some(32),
            temperature: Some(0.3),
            seed: Some(5),
            ..Default::default()
        };
        generator.generate_text("hi", Some(&overrides)).unwrap();
        let seen = model.seen.lock();
        assert_eq!(seen[0].max_new_tokens, 32);
        assert_eq!(seen[0].temperature, 0.3);
        assert_eq!(seen[0].seed, Some(5));
        assert_eq!(seen[0].top_p, 0.92);
    }

    #[test]
    fn several_return_sequences_yield_a_list() {
        let (model, codec) = echo_backend("stars");
        let generator = TextGenerator::with_backend(model, codec);
        let overrides = GenerationOverrides {
            num_return_sequences: Some(3),
            ..Default::default()
        };
        let out = generator.generate_text("night", Some(&overrides)).unwrap();
        assert_eq!(
            out,
            GeneratedText::Multiple(vec!["night stars".to_string(); 3])
        );
    }

    #[test]
    fn inference_failures_propagate() {
        let generator =
            TextGenerator::with_backend(Arc::new(FailingModel), Arc::new(WordCodec::new()));
        let err = generator.generate_text("night", None).unwrap_err();
        assert!(matches!(err, ServiceError::Inference(_)));
    }

    #[test]
    fn variations_use_consecutive_seeds() {
        let (model, codec) = echo_backend("a sleepy owl");
        let generator = TextGenerator::with_backend(model.clone(), codec);
        let variations = generator
            .generate_multiple_variations("Once upon a time,", 3, None)
            .unwrap();
        assert_eq!(variations, vec!["a sleepy owl".to_string(); 3]);

        let seeds: Vec<_> = model.seen.lock().iter().map(|p| p.seed).collect();
        assert_eq!(seeds, vec![Some(42), Some(43), Some(44)]);
        assert!(model.seen.lock().iter().all(|p| p.num_return_sequences == 1));
    }

    #[test]
    fn exact_prefix_is_stripped() {
        let completion = extract_completion("Story: Once upon a time, a cat slept.", "Story: Once upon a time,");
        assert_eq!(completion, "a cat slept.");
    }

    #[test]
    fn prompt_tail_locates_the_boundary() {
        let prompt = "Write a story.\n\nStory: Once upon a time, ";
        let output = "Write a story. Story: Once upon a time, a fox dreamed.";
        assert_eq!(extract_completion(output, prompt), "a fox dreamed.");
    }

    #[test]
    fn unmatched_output_is_returned_whole() {
        let output = "Completely unrelated text.";
        assert_eq!(extract_completion(output, "Tell me a story please"), output);
    }

    #[test]
    fn tail_handles_multibyte_prompts() {
        let prompt = "Érase una vez, en un café…";
        let output = "Érase una vez en un café… un gato.";
        assert_eq!(extract_completion(output, prompt), "un gato.");
    }
}
