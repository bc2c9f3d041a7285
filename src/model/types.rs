use serde::{Deserialize, Serialize};

/// Fully resolved sampling configuration handed to a model backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub do_sample: bool,
    pub repetition_penalty: f64,
    /// Minimum total sequence length (prompt included) before EOS is allowed.
    pub min_length: usize,
    pub num_return_sequences: usize,
    pub seed: Option<u64>,
    pub pad_token_id: Option<u32>,
    pub eos_token_id: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 200,
            temperature: 1.0,
            top_p: 0.92,
            do_sample: true,
            repetition_penalty: 1.1,
            min_length: 100,
            num_return_sequences: 1,
            seed: None,
            pad_token_id: None,
            eos_token_id: None,
        }
    }
}

/// Caller-supplied values that replace the defaults field by field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerationOverrides {
    pub max_new_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub do_sample: Option<bool>,
    pub repetition_penalty: Option<f64>,
    pub min_length: Option<usize>,
    pub num_return_sequences: Option<usize>,
    pub seed: Option<u64>,
}

impl GenerationOverrides {
    pub fn merge_into(&self, mut params: GenerationParams) -> GenerationParams {
        if let Some(v) = self.max_new_tokens {
            params.max_new_tokens = v;
        }
        if let Some(v) = self.temperature {
            params.temperature = v;
        }
        if let Some(v) = self.top_p {
            params.top_p = v;
        }
        if let Some(v) = self.do_sample {
            params.do_sample = v;
        }
        if let Some(v) = self.repetition_penalty {
            params.repetition_penalty = v;
        }
        if let Some(v) = self.min_length {
            params.min_length = v;
        }
        if let Some(v) = self.num_return_sequences {
            params.num_return_sequences = v.max(1);
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedText {
    Single(String),
    Multiple(Vec<String>),
}

impl GeneratedText {
    /// The first sequence, or an empty string when nothing was produced.
    pub fn into_first(self) -> String {
        match self {
            GeneratedText::Single(text) => text,
            GeneratedText::Multiple(texts) => texts.into_iter().next().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let overrides = GenerationOverrides {
            max_new_tokens: Some(64),
            temperature: Some(0.4),
            seed: Some(7),
            ..Default::default()
        };
        let merged = overrides.merge_into(GenerationParams::default());
        assert_eq!(merged.max_new_tokens, 64);
        assert_eq!(merged.temperature, 0.4);
        assert_eq!(merged.seed, Some(7));
        assert_eq!(merged.top_p, 0.92);
        assert_eq!(merged.repetition_penalty, 1.1);
        assert_eq!(merged.min_length, 100);
        assert!(merged.do_sample);
        assert_eq!(merged.num_return_sequences, 1);
    }

    #[test]
    fn zero_return_sequences_means_one() {
        let overrides = GenerationOverrides {
            num_return_sequences: Some(0),
            ..Default::default()
        };
        assert_eq!(overrides.merge_into(GenerationParams::default()).num_return_sequences, 1);
    }
}
