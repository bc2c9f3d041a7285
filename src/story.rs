use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{info, warn};

use crate::{
    catalog::{AVAILABLE_GENRES, AVAILABLE_THEMES, is_known_genre, is_known_theme},
    config::{AppConfig, DEFAULT_OPENING},
    error::ServiceError,
    generation::TextGenerator,
    model::GenerationOverrides,
    postprocess::{PostProcessor, ProcessedStory},
    prompt::PromptEngine,
    quality::{QualityChecker, QualityReport},
};

const MAX_STORY_TOKENS: usize = 1024;
const FALLBACK_TITLE: &str = "A Magical Bedtime Story";

fn default_max_length() -> usize {
    200
}

fn default_temperature() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryRequest {
    pub theme: String,
    pub genre: String,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl StoryRequest {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.theme.trim().is_empty() {
            return Err(ServiceError::BadRequest("theme must not be empty".into()));
        }
        if self.genre.trim().is_empty() {
            return Err(ServiceError::BadRequest("genre must not be empty".into()));
        }
        if !is_known_theme(&self.theme) {
            return Err(ServiceError::BadRequest(format!(
                "theme must be one of: {}",
                AVAILABLE_THEMES.join(", ")
            )));
        }
        if !is_known_genre(&self.genre) {
            return Err(ServiceError::BadRequest(format!(
                "genre must be one of: {}",
                AVAILABLE_GENRES.join(", ")
            )));
        }
        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return Err(ServiceError::BadRequest(
                "temperature must be in (0, 1]".into(),
            ));
        }
        if self.max_length == 0 || self.max_length > MAX_STORY_TOKENS {
            return Err(ServiceError::BadRequest(format!(
                "max_length must be between 1 and {MAX_STORY_TOKENS}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryResponse {
    pub theme: String,
    pub genre: String,
    pub content: String,
    pub title: String,
    pub quality: QualityReport,
}

/// Runs prompt construction, generation and cleanup for one request.
#[derive(Clone)]
pub struct StoryGenerator {
    prompts: PromptEngine,
    text: TextGenerator,
    post: PostProcessor,
    quality: QualityChecker,
    opening: String,
    min_length: usize,
}

impl StoryGenerator {
    pub fn new(text: TextGenerator) -> Self {
        Self {
            prompts: PromptEngine::new(),
            text,
            post: PostProcessor::new(),
            quality: QualityChecker::new(),
            opening: DEFAULT_OPENING.to_string(),
            min_length: 100,
        }
    }

    pub fn from_config(text: TextGenerator, config: &AppConfig) -> Self {
        Self {
            opening: config.opening_phrase.clone(),
            min_length: config.min_length,
            ..Self::new(text)
        }
    }

    pub fn is_ready(&self) -> bool {
        self.text.is_ready()
    }

    pub fn generate_story(
        &self,
        theme: &str,
        genre: &str,
        max_length: usize,
        temperature: f64,
    ) -> Result<String, ServiceError> {
        info!(theme, genre, max_length, temperature, "generating story");

        let optimized = self.prompts.optimize_prompt(theme, genre, 1.0 - temperature);
        let prompt = self.prompts.create_prompt(
            theme,
            genre,
            optimized.template.key(),
            &self.opening,
            None,
        );

        let overrides = GenerationOverrides {
            max_new_tokens: Some(max_length),
            temperature: Some(optimized.temperature),
            top_p: Some(optimized.top_p),
            do_sample: Some(true),
            repetition_penalty: Some(optimized.repetition_penalty),
            min_length: Some(self.min_length),
            ..Default::default()
        };

        let full_text = self.text.generate_text(&prompt, Some(&overrides))?.into_first();
        let story = self.text.extract_completion(&full_text, &prompt);

        match self.post.process_story(&story, &self.opening) {
            ProcessedStory::Cleaned(cleaned) => Ok(cleaned),
            ProcessedStory::Fallback { story, error } => {
                warn!(%error, "post-processing failed, returning unprocessed story");
                Ok(story)
            }
        }
    }

    pub fn generate_title(&self, story: &str) -> String {
        story_title(story)
    }

    pub fn evaluate_quality(&self, story: &str) -> QualityReport {
        self.quality.check_story_quality(story)
    }

    pub fn respond(&self, request: &StoryRequest) -> Result<StoryResponse, ServiceError> {
        request.validate()?;
        let content = self.generate_story(
            &request.theme,
            &request.genre,
            request.max_length,
            request.temperature,
        )?;
        let title = self.generate_title(&content);
        let quality = self.evaluate_quality(&content);
        info!(%title, score = quality.score, "story ready");

        Ok(StoryResponse {
            theme: request.theme.clone(),
            genre: request.genre.clone(),
            content,
            title,
            quality,
        })
    }

    /// Validates, then runs generation on the blocking pool.
    pub async fn respond_async(
        self: Arc<Self>,
        request: StoryRequest,
    ) -> Result<StoryResponse, ServiceError> {
        request.validate()?;
        task::spawn_blocking(move || self.respond(&request))
            .await
            .map_err(|err| ServiceError::Inference(format!("generation task failed: {err}")))?
    }
}

/// Picks title words from just after "once upon a time", falling back to
/// the first prominent capitalized word.
pub fn story_title(story: &str) -> String {
    const INTRO: &str = "once upon a time";

    if let Some(intro_at) = story.to_lowercase().find(INTRO) {
        let after: String = story
            .get(intro_at + INTRO.len()..)
            .unwrap_or_default()
            .chars()
            .take(50)
            .collect();
        let words: Vec<String> = after
            .split_whitespace()
            .take(5)
            .filter(|word| word.starts_with(char::is_uppercase) || word.chars().count() > 4)
            .map(|word| word.trim_matches(|c: char| ",.!?;:".contains(c)).to_string())
            .filter(|word| !word.is_empty())
            .collect();
        if !words.is_empty() {
            return format!("The {}", title_case(&words.join(" ")));
        }
    }

    let words: Vec<&str> = story.split_whitespace().collect();
    if words.len() > 5 {
        if let Some(word) = words
            .iter()
            .take(20)
            .find(|word| word.starts_with(char::is_uppercase) && word.chars().count() > 3)
        {
            return format!("The {word}'s Adventure");
        }
    }

    FALLBACK_TITLE.to_string()
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
