//! Prompt construction for story generation.
//!
//! Templates are static strings with `{theme}`, `{genre}` and `{opening}`
//! placeholders. Template choice and sampling parameters can be derived from
//! the requested theme and genre through fixed lookup tables.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

const STANDARD_TEMPLATE: &str = concat!(
    "Write a short bedtime story for a young child about {theme} in the style of a {genre} tale.\n\n",
    "Story: {opening}"
);

const ENHANCED_TEMPLATE: &str = concat!(
    "Write a short bedtime story for a young child about {theme} in the style of a {genre} tale.\n",
    "The story should have a clear beginning, middle, and end with consistent characters throughout. ",
    "It should be simple, engaging, and have a positive message.\n\n",
    "Story: {opening}"
);

const CHARACTER_FOCUSED_TEMPLATE: &str = concat!(
    "Write a short bedtime story for a young child about {theme} in the style of a {genre} tale.\n",
    "The main characters should remain consistent throughout the story.\n",
    "The story should have a clear arc with a beginning, middle, and end.\n\n",
    "Story: {opening}"
);

const EDUCATIONAL_TEMPLATE: &str = concat!(
    "Write a short, educational bedtime story for a young child about {theme} in the style of a {genre} tale.\n",
    "Include a simple lesson or message that's appropriate for children.\n",
    "The story should be engaging and easy to understand.\n\n",
    "Story: {opening}"
);

const EDUCATIONAL_THEMES: &[&str] = &["animals", "space", "ocean", "seasons", "weather"];
const CHARACTER_THEMES: &[&str] = &["friendship", "family", "toys"];
const EDUCATIONAL_GENRES: &[&str] = &["educational", "fable"];
const CHARACTER_GENRES: &[&str] = &["adventure", "mystery"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Standard,
    Enhanced,
    CharacterFocused,
    Educational,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::Standard,
        TemplateKind::Enhanced,
        TemplateKind::CharacterFocused,
        TemplateKind::Educational,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "standard" => Some(TemplateKind::Standard),
            "enhanced" => Some(TemplateKind::Enhanced),
            "character_focused" => Some(TemplateKind::CharacterFocused),
            "educational" => Some(TemplateKind::Educational),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            TemplateKind::Standard => "standard",
            TemplateKind::Enhanced => "enhanced",
            TemplateKind::CharacterFocused => "character_focused",
            TemplateKind::Educational => "educational",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            TemplateKind::Standard => STANDARD_TEMPLATE,
            TemplateKind::Enhanced => ENHANCED_TEMPLATE,
            TemplateKind::CharacterFocused => CHARACTER_FOCUSED_TEMPLATE,
            TemplateKind::Educational => EDUCATIONAL_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Template and sampling parameters picked for a theme/genre combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizedParams {
    pub template: TemplateKind,
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptEngine;

impl PromptEngine {
    pub fn new() -> Self {
        Self
    }

    /// Builds the prompt for `template_type`, falling back to the standard
    /// template when the key is unknown.
    pub fn create_prompt(
        &self,
        theme: &str,
        genre: &str,
        template_type: &str,
        opening: &str,
        additional_guidance: Option<&[(&str, &str)]>,
    ) -> String {
        let kind = TemplateKind::from_key(template_type).unwrap_or_else(|| {
            warn!(
                template_type,
                "template type not found, defaulting to 'standard'"
            );
            TemplateKind::Standard
        });

        let mut prompt = render(kind.template(), theme, genre, opening);

        if let Some(guidance) = additional_guidance.filter(|g| !g.is_empty()) {
            let lines: Vec<String> = guidance
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect();
            prompt.push_str("\n\nAdditional guidance:\n");
            prompt.push_str(&lines.join("\n"));
        }

        debug!(template = %kind, "created prompt");
        prompt
    }

    pub fn optimize_for_theme(&self, theme: &str) -> TemplateKind {
        if EDUCATIONAL_THEMES.contains(&theme) {
            TemplateKind::Educational
        } else if CHARACTER_THEMES.contains(&theme) {
            TemplateKind::CharacterFocused
        } else {
            TemplateKind::Standard
        }
    }

    pub fn optimize_for_genre(&self, genre: &str) -> TemplateKind {
        if EDUCATIONAL_GENRES.contains(&genre) {
            TemplateKind::Educational
        } else if CHARACTER_GENRES.contains(&genre) {
            TemplateKind::CharacterFocused
        } else {
            TemplateKind::Standard
        }
    }

    /// Higher `constraint_level` (0.0 to 1.0) means cooler, more predictable sampling.
    pub fn optimize_prompt(&self, theme: &str, genre: &str, constraint_level: f64) -> OptimizedParams {
        let level = if constraint_level.is_finite() {
            constraint_level.clamp(0.0, 1.0)
        } else {
            0.5
        };

        let template = match self.optimize_for_theme(theme) {
            TemplateKind::Standard => self.optimize_for_genre(genre),
            chosen => chosen,
        };

        let params = OptimizedParams {
            template,
            temperature: (0.95 - 0.4 * level).clamp(0.3, 0.95),
            top_p: (0.7 + 0.25 * level).clamp(0.7, 0.95),
            repetition_penalty: 1.0 + 0.25 * level,
        };
        debug!(?params, constraint_level = level, "optimized prompt parameters");
        params
    }
}

// Single pass so placeholder text inside a value is never expanded.
fn render(template: &str, theme: &str, genre: &str, opening: &str) -> String {
    let mut out = String::with_capacity(template.len() + theme.len() + genre.len() + opening.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let (value, consumed) = if tail.starts_with("{theme}") {
            (theme, "{theme}".len())
        } else if tail.starts_with("{genre}") {
            (genre, "{genre}".len())
        } else if tail.starts_with("{opening}") {
            (opening, "{opening}".len())
        } else {
            ("{", 1)
        };
        out.push_str(value);
        rest = &tail[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_substitutes_theme_and_genre() {
        let engine = PromptEngine::new();
        for kind in TemplateKind::ALL {
            let prompt = engine.create_prompt("ocean", "fable", kind.key(), "Once upon a time, ", None);
            assert!(prompt.contains("about ocean"), "{kind}: {prompt}");
            assert!(prompt.contains("a fable tale"), "{kind}: {prompt}");
            assert!(prompt.ends_with("Story: Once upon a time, "), "{kind}: {prompt}");
            assert!(!prompt.contains('{'));
        }
    }

    #[test]
    fn unknown_template_falls_back_to_standard() {
        let engine = PromptEngine::new();
        let fallback = engine.create_prompt("magic", "funny", "limerick", "Once upon a time, ", None);
        let standard = engine.create_prompt("magic", "funny", "standard", "Once upon a time, ", None);
        assert_eq!(fallback, standard);
    }

    #[test]
    fn guidance_is_appended_in_order() {
        let engine = PromptEngine::new();
        let guidance = [("length", "short"), ("tone", "calm")];
        let prompt = engine.create_prompt("toys", "bedtime", "enhanced", "Once, ", Some(&guidance));
        assert!(prompt.ends_with("Story: Once, \n\nAdditional guidance:\nlength: short\ntone: calm"));
    }

    #[test]
    fn empty_guidance_adds_nothing() {
        let engine = PromptEngine::new();
        let with_empty = engine.create_prompt("toys", "bedtime", "standard", "Once, ", Some(&[]));
        assert!(!with_empty.contains("Additional guidance"));
    }

    #[test]
    fn placeholder_text_in_values_is_left_alone() {
        let engine = PromptEngine::new();
        let prompt = engine.create_prompt("{genre}", "fable", "standard", "", None);
        assert!(prompt.contains("about {genre} in"));
    }

    #[test]
    fn theme_heuristic() {
        let engine = PromptEngine::new();
        assert_eq!(engine.optimize_for_theme("animals"), TemplateKind::Educational);
        assert_eq!(engine.optimize_for_theme("space"), TemplateKind::Educational);
        assert_eq!(engine.optimize_for_theme("friendship"), TemplateKind::CharacterFocused);
        assert_eq!(engine.optimize_for_theme("unknown"), TemplateKind::Standard);
    }

    #[test]
    fn genre_heuristic() {
        let engine = PromptEngine::new();
        assert_eq!(engine.optimize_for_genre("fable"), TemplateKind::Educational);
        assert_eq!(engine.optimize_for_genre("mystery"), TemplateKind::CharacterFocused);
        assert_eq!(engine.optimize_for_genre("funny"), TemplateKind::Standard);
    }

    #[test]
    fn theme_takes_precedence_over_genre() {
        let engine = PromptEngine::new();
        let params = engine.optimize_prompt("friendship", "fable", 0.5);
        assert_eq!(params.template, TemplateKind::CharacterFocused);

        let params = engine.optimize_prompt("magic", "adventure", 0.5);
        assert_eq!(params.template, TemplateKind::CharacterFocused);

        let params = engine.optimize_prompt("magic", "funny", 0.5);
        assert_eq!(params.template, TemplateKind::Standard);
    }

    #[test]
    fn sampling_parameters_stay_in_range() {
        let engine = PromptEngine::new();
        for step in 0..=20 {
            let level = step as f64 / 20.0;
            let params = engine.optimize_prompt("forest", "fantasy", level);
            assert!((0.3..=0.95).contains(&params.temperature), "{level}: {params:?}");
            assert!((0.7..=0.95).contains(&params.top_p), "{level}: {params:?}");
            assert!((1.0..=1.25).contains(&params.repetition_penalty));
        }

        let loose = engine.optimize_prompt("forest", "fantasy", 0.0);
        assert!((loose.temperature - 0.95).abs() < 1e-9);
        assert!((loose.top_p - 0.7).abs() < 1e-9);

        let tight = engine.optimize_prompt("forest", "fantasy", 1.0);
        assert!((tight.temperature - 0.55).abs() < 1e-9);
        assert!((tight.top_p - 0.95).abs() < 1e-9);
        assert!((tight.repetition_penalty - 1.25).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_constraint_is_clamped() {
        let engine = PromptEngine::new();
        let params = engine.optimize_prompt("forest", "fantasy", 7.0);
        assert!((params.top_p - 0.95).abs() < 1e-9);
        assert!((params.repetition_penalty - 1.25).abs() < 1e-9);
    }
}
